use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema if it does not exist. Idempotent; invoked explicitly
/// by `ragchat init` (and by tests), never as a startup side effect.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    // Knowledge-base chunks: one row per embedded chunk, partitioned by
    // session_id. The embedding is a little-endian f32 BLOB.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_chunks (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            source TEXT NOT NULL,
            file_type TEXT NOT NULL,
            page INTEGER,
            text TEXT NOT NULL,
            upload_timestamp INTEGER NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chat turns: append-only, ordered per session by turn_number. Kept in
    // its own table rather than the vector table — turns carry no vectors.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_turns (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            message TEXT NOT NULL,
            turn_number INTEGER NOT NULL,
            timestamp INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // session_id indexes keep the mandatory partition filter cheap; the
    // compound index serves the turn-ordered history fetch.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_kb_chunks_session ON kb_chunks(session_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_turns_session ON chat_turns(session_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_turns_session_turn ON chat_turns(session_id, turn_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete every row from both tables. This is the explicit maintenance
/// wipe behind `ragchat reset --yes`; normal startup never calls it.
pub async fn wipe_all(pool: &SqlitePool) -> Result<(u64, u64)> {
    let chunks = sqlx::query("DELETE FROM kb_chunks")
        .execute(pool)
        .await?
        .rows_affected();
    let turns = sqlx::query("DELETE FROM chat_turns")
        .execute(pool)
        .await?
        .rows_affected();
    Ok((chunks, turns))
}
