//! Upload pipeline: extract → chunk → embed → store.
//!
//! Each uploaded file is extracted into logical sections, every section is
//! chunked independently, the chunks are embedded in config-sized batches,
//! and the resulting records land in the knowledge store under the
//! caller's session. A file that fails extraction is logged and skipped —
//! never fatal to a batch upload.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding;
use crate::extract::extract_sections;
use crate::models::ChunkRecord;
use crate::store::KnowledgeStore;

/// Outcome of a batch upload, for reporting.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files_processed: u64,
    pub files_skipped: u64,
    pub chunks_written: u64,
}

/// Ingest one file's bytes into the session's knowledge base. Returns the
/// number of chunks written; zero chunks (blank file) is a successful
/// no-op that writes nothing.
pub async fn ingest_file(
    config: &Config,
    pool: &SqlitePool,
    session_id: &str,
    filename: &str,
    bytes: &[u8],
) -> Result<u64> {
    let sections =
        extract_sections(filename, bytes).map_err(|e| anyhow::anyhow!("{}: {}", filename, e))?;

    // Chunk each logical unit independently so provenance (page/sheet)
    // stays attached to the chunks it produced.
    let mut pending: Vec<(String, &crate::models::DocumentSection)> = Vec::new();
    for section in &sections {
        for chunk in chunk_text(
            &section.text,
            config.chunking.max_words,
            config.chunking.overlap_words,
        ) {
            if !chunk.trim().is_empty() {
                pending.push((chunk, section));
            }
        }
    }

    if pending.is_empty() {
        return Ok(0);
    }

    let upload_timestamp = chrono::Utc::now().timestamp();
    let store = KnowledgeStore::new(pool.clone());
    let mut written = 0u64;

    for batch in pending.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|(text, _)| text.clone()).collect();
        let vectors = embedding::embed_texts(&config.embedding, &texts)
            .await
            .with_context(|| format!("embedding failed for {}", filename))?;

        let records: Vec<ChunkRecord> = batch
            .iter()
            .zip(vectors)
            .map(|((text, section), embedding)| ChunkRecord {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                source: section.source.clone(),
                file_type: section.file_type.clone(),
                page: section.page,
                text: text.clone(),
                upload_timestamp,
                embedding,
            })
            .collect();

        store.upsert_chunks(&records).await?;
        written += records.len() as u64;
    }

    Ok(written)
}

/// CLI entry point: ingest a batch of file paths into one session,
/// skipping (and reporting) files that fail, then print a summary.
pub async fn run_upload(
    config: &Config,
    pool: &SqlitePool,
    session_id: &str,
    paths: &[std::path::PathBuf],
) -> Result<UploadOutcome> {
    let mut outcome = UploadOutcome::default();

    for path in paths {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.txt")
            .to_string();

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Warning: could not read {}: {}", path.display(), e);
                outcome.files_skipped += 1;
                continue;
            }
        };

        match ingest_file(config, pool, session_id, &filename, &bytes).await {
            Ok(written) => {
                outcome.files_processed += 1;
                outcome.chunks_written += written;
            }
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", filename, e);
                outcome.files_skipped += 1;
            }
        }
    }

    println!("upload (session {})", session_id);
    println!("  files processed: {}", outcome.files_processed);
    println!("  files skipped: {}", outcome.files_skipped);
    println!("  chunks written: {}", outcome.chunks_written);

    Ok(outcome)
}
