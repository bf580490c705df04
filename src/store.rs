//! Session-scoped knowledge store.
//!
//! Persists embedded chunks and serves nearest-neighbor search. Every
//! query carries a hard `WHERE session_id = ?` — the session partition is
//! the isolation mechanism, so a read that skipped the filter would be a
//! correctness bug, not a performance one. Similarity is cosine over the
//! stored vectors, computed in Rust over the session's candidate rows.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ChunkRecord, ScoredChunk};

pub struct KnowledgeStore {
    pool: SqlitePool,
}

impl KnowledgeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch of chunks in one transaction. An empty batch is a
    /// successful no-op. Ids are caller-generated UUIDs, so concurrent
    /// uploads into the same session never clobber each other.
    pub async fn upsert_chunks(&self, chunks: &[ChunkRecord]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO kb_chunks (id, session_id, source, file_type, page, text, upload_timestamp, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.session_id)
            .bind(&chunk.source)
            .bind(&chunk.file_type)
            .bind(chunk.page)
            .bind(&chunk.text)
            .bind(chunk.upload_timestamp)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Rank the session's chunks by cosine similarity to the query
    /// embedding, best match first, at most `top_k` results. A session
    /// with no chunks returns an empty vec, not an error.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        session_id: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            "SELECT text, source, embedding FROM kb_chunks WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredChunk {
                    text: row.get("text"),
                    source: row.get("source"),
                    score: cosine_similarity(query_embedding, &vec),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    /// Remove every chunk belonging to the session. Idempotent: deleting
    /// an unknown session succeeds with zero rows affected.
    pub async fn delete_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kb_chunks WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of chunks stored for a session.
    pub async fn count(&self, session_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM kb_chunks WHERE session_id = ?")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
