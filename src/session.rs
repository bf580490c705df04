//! Session lifecycle: explicit deletion of everything a session owns.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::history::ChatHistory;
use crate::store::KnowledgeStore;

/// Delete all chunks and chat turns carrying this session id. Idempotent.
///
/// Unlike the read paths, failures here are surfaced: the caller promised
/// the user their data is gone, so a partial deletion must be visible.
pub async fn delete_session_data(pool: &SqlitePool, session_id: &str) -> Result<(u64, u64)> {
    let turns = ChatHistory::new(pool.clone())
        .delete_session(session_id)
        .await
        .with_context(|| format!("failed to delete chat history for session {}", session_id))?;

    let chunks = KnowledgeStore::new(pool.clone())
        .delete_session(session_id)
        .await
        .with_context(|| {
            format!(
                "failed to delete knowledge base data for session {}",
                session_id
            )
        })?;

    Ok((chunks, turns))
}
