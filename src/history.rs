//! Append-only chat-turn log, queryable per session in turn order.
//!
//! The formatted context block fed to the LLM is rebuilt from the most
//! recent turns: the fetch over-asks (`max_turns * 2` rows, newest first)
//! and then re-sorts ascending by turn_number client-side — the store's
//! native ordering is deliberately not trusted. History is best-effort
//! everywhere: reads degrade to an empty string and writes degrade to a
//! warning, so a history failure never blocks an answer.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ChatTurn, Role};

pub struct ChatHistory {
    pool: SqlitePool,
}

impl ChatHistory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one turn. Callers on the streaming path treat a failure as
    /// non-fatal and log it; the error is still surfaced for them to do so.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        message: &str,
        turn_number: i64,
    ) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO chat_turns (id, session_id, role, message, turn_number, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(session_id)
        .bind(role.as_str())
        .bind(message)
        .bind(turn_number)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The most recent `max_turns` exchanges, formatted as
    /// `"<Role>: <message>"` lines in ascending turn order (oldest first).
    ///
    /// Returns `""` when there is no history or when the read fails — the
    /// error is logged, never propagated, because history is best-effort
    /// context, not the answer path.
    pub async fn recent_context(&self, session_id: &str, max_turns: i64) -> String {
        match self.fetch_recent_turns(session_id, max_turns).await {
            Ok(turns) => format_turns(&turns),
            Err(e) => {
                eprintln!(
                    "Warning: failed to read chat history for session {}: {}",
                    session_id, e
                );
                String::new()
            }
        }
    }

    /// Fetch up to `max_turns * 2` most-recent turns (a user and an
    /// assistant row per exchange), then re-sort ascending client-side.
    async fn fetch_recent_turns(&self, session_id: &str, max_turns: i64) -> Result<Vec<ChatTurn>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, role, message, turn_number, timestamp
            FROM chat_turns
            WHERE session_id = ?
            ORDER BY turn_number DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(max_turns.saturating_mul(2))
        .fetch_all(&self.pool)
        .await?;

        let mut turns: Vec<ChatTurn> = rows
            .iter()
            .filter_map(|row| {
                let role = Role::parse(row.get::<String, _>("role").as_str())?;
                Some(ChatTurn {
                    id: row.get("id"),
                    session_id: row.get("session_id"),
                    role,
                    message: row.get("message"),
                    turn_number: row.get("turn_number"),
                    timestamp: row.get("timestamp"),
                })
            })
            .collect();

        turns.sort_by_key(|t| (t.turn_number, t.role == Role::Assistant, t.timestamp));
        Ok(turns)
    }

    /// Remove every turn belonging to the session. Idempotent.
    pub async fn delete_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_turns WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of turns stored for a session.
    pub async fn count(&self, session_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_turns WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

/// Format turns as `"<Role>: <message>"` lines joined by newlines.
fn format_turns(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.label(), t.message))
        .collect::<Vec<_>>()
        .join("\n")
}
