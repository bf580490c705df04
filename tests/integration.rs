//! End-to-end tests over a temporary SQLite database.
//!
//! Embedding and chat providers are network services, so these tests drive
//! the stores with synthetic vectors and exercise the pure pipeline stages
//! (extraction, chunking, prompt assembly) directly.

use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

use ragchat::ask;
use ragchat::chunk::chunk_text;
use ragchat::config::{
    ChunkingConfig, Config, DbConfig, EmbeddingConfig, LlmConfig, RetrievalConfig, ServerConfig,
};
use ragchat::db;
use ragchat::extract::extract_sections;
use ragchat::history::ChatHistory;
use ragchat::migrate;
use ragchat::models::{ChunkRecord, Role};
use ragchat::session;
use ragchat::store::KnowledgeStore;

fn test_config(db_path: PathBuf) -> Config {
    Config {
        db: DbConfig { path: db_path },
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        embedding: EmbeddingConfig::default(),
        llm: LlmConfig::default(),
        server: ServerConfig::default(),
    }
}

async fn setup() -> (TempDir, sqlx::SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path().join("ragchat.sqlite"));
    let pool = db::connect(&cfg).await.unwrap();
    migrate::ensure_schema(&pool).await.unwrap();
    (tmp, pool)
}

fn chunk_record(session_id: &str, text: &str, embedding: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        source: "test.txt".to_string(),
        file_type: "txt".to_string(),
        page: None,
        text: text.to_string(),
        upload_timestamp: 0,
        embedding,
    }
}

#[tokio::test]
async fn search_never_crosses_sessions() {
    let (_tmp, pool) = setup().await;
    let store = KnowledgeStore::new(pool);

    // Session B's chunk is a perfect match for the query; it must still
    // never appear in session A's results.
    let query = vec![1.0, 0.0, 0.0];
    store
        .upsert_chunks(&[
            chunk_record("session-a", "a's document", vec![0.1, 0.9, 0.0]),
            chunk_record("session-b", "b's document", vec![1.0, 0.0, 0.0]),
        ])
        .await
        .unwrap();

    let hits = store.search(&query, "session-a", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "a's document");

    let hits = store.search(&query, "session-b", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "b's document");
}

#[tokio::test]
async fn search_ranks_by_similarity_and_truncates() {
    let (_tmp, pool) = setup().await;
    let store = KnowledgeStore::new(pool);

    store
        .upsert_chunks(&[
            chunk_record("s", "far", vec![0.0, 1.0]),
            chunk_record("s", "near", vec![1.0, 0.1]),
            chunk_record("s", "exact", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

    let hits = store.search(&[1.0, 0.0], "s", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].text, "exact");
    assert_eq!(hits[1].text, "near");
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn search_on_unknown_session_is_empty() {
    let (_tmp, pool) = setup().await;
    let store = KnowledgeStore::new(pool);
    let hits = store.search(&[1.0, 0.0], "nobody", 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn empty_upsert_is_a_no_op() {
    let (_tmp, pool) = setup().await;
    let store = KnowledgeStore::new(pool);
    store.upsert_chunks(&[]).await.unwrap();
    assert_eq!(store.count("s").await.unwrap(), 0);
}

#[tokio::test]
async fn history_formats_in_ascending_turn_order() {
    let (_tmp, pool) = setup().await;
    let hist = ChatHistory::new(pool);

    // Insert out of order; the formatted context must come back ascending,
    // user before assistant within each exchange.
    hist.append_turn("s", Role::Assistant, "second answer", 2)
        .await
        .unwrap();
    hist.append_turn("s", Role::User, "first question", 1)
        .await
        .unwrap();
    hist.append_turn("s", Role::Assistant, "first answer", 1)
        .await
        .unwrap();
    hist.append_turn("s", Role::User, "second question", 2)
        .await
        .unwrap();

    let context = hist.recent_context("s", 4).await;
    assert_eq!(
        context,
        "User: first question\nAssistant: first answer\nUser: second question\nAssistant: second answer"
    );
}

#[tokio::test]
async fn history_window_keeps_most_recent_turns() {
    let (_tmp, pool) = setup().await;
    let hist = ChatHistory::new(pool);

    for n in 1..=5 {
        hist.append_turn("s", Role::User, &format!("q{}", n), n)
            .await
            .unwrap();
        hist.append_turn("s", Role::Assistant, &format!("a{}", n), n)
            .await
            .unwrap();
    }

    // max_turns = 2 over-fetches 4 rows: the last two exchanges only.
    let context = hist.recent_context("s", 2).await;
    assert_eq!(context, "User: q4\nAssistant: a4\nUser: q5\nAssistant: a5");
}

#[tokio::test]
async fn history_window_tolerates_huge_limits() {
    let (_tmp, pool) = setup().await;
    let hist = ChatHistory::new(pool);

    hist.append_turn("s", Role::User, "q", 1).await.unwrap();
    hist.append_turn("s", Role::Assistant, "a", 1).await.unwrap();

    // The over-fetch doubles the limit; it must not overflow for
    // caller-supplied values near the top of the range.
    let context = hist.recent_context("s", i64::MAX).await;
    assert_eq!(context, "User: q\nAssistant: a");
}

#[tokio::test]
async fn history_for_unknown_session_is_empty_string() {
    let (_tmp, pool) = setup().await;
    let hist = ChatHistory::new(pool);
    assert_eq!(hist.recent_context("nobody", 4).await, "");
}

#[tokio::test]
async fn history_is_isolated_per_session() {
    let (_tmp, pool) = setup().await;
    let hist = ChatHistory::new(pool);

    hist.append_turn("a", Role::User, "hello from a", 1)
        .await
        .unwrap();
    hist.append_turn("b", Role::User, "hello from b", 1)
        .await
        .unwrap();

    assert_eq!(hist.recent_context("a", 4).await, "User: hello from a");
    assert_eq!(hist.recent_context("b", 4).await, "User: hello from b");
}

#[tokio::test]
async fn delete_session_clears_both_stores_and_is_idempotent() {
    let (_tmp, pool) = setup().await;
    let store = KnowledgeStore::new(pool.clone());
    let hist = ChatHistory::new(pool.clone());

    store
        .upsert_chunks(&[chunk_record("s", "doc", vec![1.0, 0.0])])
        .await
        .unwrap();
    hist.append_turn("s", Role::User, "q", 1).await.unwrap();
    hist.append_turn("s", Role::Assistant, "a", 1).await.unwrap();

    let (chunks, turns) = session::delete_session_data(&pool, "s").await.unwrap();
    assert_eq!(chunks, 1);
    assert_eq!(turns, 2);
    assert_eq!(store.count("s").await.unwrap(), 0);
    assert_eq!(hist.count("s").await.unwrap(), 0);

    // Deleting again succeeds with nothing to remove.
    let (chunks, turns) = session::delete_session_data(&pool, "s").await.unwrap();
    assert_eq!(chunks, 0);
    assert_eq!(turns, 0);
}

#[tokio::test]
async fn delete_session_leaves_other_sessions_intact() {
    let (_tmp, pool) = setup().await;
    let store = KnowledgeStore::new(pool.clone());

    store
        .upsert_chunks(&[
            chunk_record("a", "a's doc", vec![1.0, 0.0]),
            chunk_record("b", "b's doc", vec![0.0, 1.0]),
        ])
        .await
        .unwrap();

    session::delete_session_data(&pool, "a").await.unwrap();
    assert_eq!(store.count("a").await.unwrap(), 0);
    assert_eq!(store.count("b").await.unwrap(), 1);
}

#[tokio::test]
async fn wipe_all_clears_every_session() {
    let (_tmp, pool) = setup().await;
    let store = KnowledgeStore::new(pool.clone());
    let hist = ChatHistory::new(pool.clone());

    store
        .upsert_chunks(&[
            chunk_record("a", "x", vec![1.0]),
            chunk_record("b", "y", vec![1.0]),
        ])
        .await
        .unwrap();
    hist.append_turn("a", Role::User, "q", 1).await.unwrap();

    let (chunks, turns) = migrate::wipe_all(&pool).await.unwrap();
    assert_eq!(chunks, 2);
    assert_eq!(turns, 1);
    assert_eq!(store.count("a").await.unwrap(), 0);
    assert_eq!(store.count("b").await.unwrap(), 0);
}

#[test]
fn small_text_file_becomes_one_chunk() {
    let text = "First sentence here. Second sentence follows. Third one ends it.";
    let sections = extract_sections("notes.txt", text.as_bytes()).unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].file_type, "txt");

    let chunks = chunk_text(&sections[0].text, 200, 50);
    assert_eq!(chunks, vec![text.to_string()]);
}

#[test]
fn prompt_carries_markers_when_session_is_fresh() {
    let prompt = ask::build_prompt("what is this?", "", "");
    assert!(prompt.contains(ask::NO_HISTORY_MARKER));
    assert!(prompt.contains(ask::NO_CONTEXT_MARKER));
    assert!(prompt.contains("what is this?"));
}

#[test]
fn prompt_embeds_real_context_verbatim() {
    let prompt = ask::build_prompt(
        "summarize",
        "User: hi\nAssistant: hello",
        "chunk one\n\nchunk two",
    );
    assert!(prompt.contains("User: hi\nAssistant: hello"));
    assert!(prompt.contains("chunk one\n\nchunk two"));
    assert!(!prompt.contains(ask::NO_HISTORY_MARKER));
    assert!(!prompt.contains(ask::NO_CONTEXT_MARKER));
}

#[test]
fn turn_numbers_advance_one_per_exchange() {
    assert_eq!(ask::turn_number_from_context(""), 1);
    assert_eq!(ask::turn_number_from_context("User: q\nAssistant: a"), 2);
    assert_eq!(
        ask::turn_number_from_context("User: q1\nAssistant: a1\nUser: q2\nAssistant: a2"),
        3
    );
}

#[test]
fn missing_session_id_mints_a_fresh_uuid() {
    let minted = ask::resolve_session_id(None);
    assert!(Uuid::parse_str(&minted).is_ok());

    let blank = ask::resolve_session_id(Some("   "));
    assert!(Uuid::parse_str(&blank).is_ok());

    assert_eq!(ask::resolve_session_id(Some("keep-me")), "keep-me");
}
