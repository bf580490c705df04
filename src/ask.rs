//! Question-answering orchestrator.
//!
//! One exchange moves through four phases: the question is accepted (a
//! missing session id is tolerated and a fresh one minted), knowledge-base
//! and chat-history context are gathered concurrently, the assembled
//! prompt is streamed through the LLM with tokens forwarded as they
//! arrive, and the exchange is persisted — the user turn before streaming
//! starts, the assistant turn only after the stream completes cleanly.
//!
//! Availability beats completeness on this path: a failed search degrades
//! to the no-context marker, and history failures never block the answer.

use anyhow::Result;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding;
use crate::history::ChatHistory;
use crate::llm;
use crate::models::Role;
use crate::store::KnowledgeStore;

/// Marker inserted when the session has no prior turns. Verbatim — the
/// system prompt refers to it.
pub const NO_HISTORY_MARKER: &str = "No prior chat history for this session.";

/// Marker inserted when the knowledge base has nothing relevant. Distinct
/// from an empty string so the model can be told to admit ignorance
/// instead of hallucinating.
pub const NO_CONTEXT_MARKER: &str =
    "No relevant knowledge base context found for this question.";

/// System instructions: answer factual questions only from the supplied
/// knowledge-base block, use the history block for conversational flow,
/// and say so when the information is not there.
pub const SYSTEM_PROMPT: &str = "\
You are a helpful assistant that answers questions using only the provided context.

Rules:
1. When the user asks a factual question, answer strictly from the \
'Knowledge Base Context' block. If that block says no relevant context \
was found, you do not have the information.
2. Use the 'Chat History' block to keep conversational continuity.
3. When you cannot find the answer in the provided context, say so \
plainly and invite the user to upload a relevant document. Never invent \
facts or fall back on outside knowledge for questions that should be \
answered from the context.";

/// Assemble the bounded prompt: history block (or its marker), knowledge
/// block (or its marker), and the raw question.
pub fn build_prompt(question: &str, chat_context: &str, kb_context: &str) -> String {
    let history_block = if chat_context.is_empty() {
        NO_HISTORY_MARKER
    } else {
        chat_context
    };
    let kb_block = if kb_context.is_empty() {
        NO_CONTEXT_MARKER
    } else {
        kb_context
    };

    format!(
        "Chat History:\n{}\n\nKnowledge Base Context:\n{}\n\nUser's Question:\n{}",
        history_block, kb_block, question
    )
}

/// Turn number for the exchange, derived from the formatted history: each
/// exchange contributes a user line and an assistant line, so the next
/// turn is `lines / 2 + 1`; an empty context means turn 1. Deterministic
/// for a given context string.
pub fn turn_number_from_context(chat_context: &str) -> i64 {
    if chat_context.is_empty() {
        1
    } else {
        (chat_context.lines().count() as i64) / 2 + 1
    }
}

/// Use the caller's session id, or mint one when absent.
pub fn resolve_session_id(session_id: Option<&str>) -> String {
    match session_id {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => {
            let minted = Uuid::new_v4().to_string();
            eprintln!(
                "Warning: no session_id provided; generated new one: {}",
                minted
            );
            minted
        }
    }
}

/// Gather the knowledge-base block for a question. Blank questions and
/// failed searches both yield `""` (the prompt builder substitutes the
/// marker); failures are logged, not propagated.
async fn gather_kb_context(config: &Config, pool: &SqlitePool, session_id: &str, question: &str) -> String {
    if question.trim().is_empty() {
        return String::new();
    }

    let query_embedding = match embedding::embed_query(&config.embedding, question).await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Warning: query embedding failed: {}", e);
            return String::new();
        }
    };

    let store = KnowledgeStore::new(pool.clone());
    match store
        .search(&query_embedding, session_id, config.retrieval.top_k)
        .await
    {
        Ok(hits) => hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        Err(e) => {
            eprintln!(
                "Warning: knowledge base search failed for session {}: {}",
                session_id, e
            );
            String::new()
        }
    }
}

/// Run one full exchange and return the token receiver. Tokens arrive in
/// model-generation order; the full answer is persisted only after the
/// stream ends without error. Dropping the receiver cancels the stream
/// and skips the assistant persist.
pub async fn ask(
    config: &Config,
    pool: &SqlitePool,
    session_id: &str,
    question: &str,
) -> Result<mpsc::Receiver<Result<String>>> {
    let history = ChatHistory::new(pool.clone());

    // The two context sources are independent; gather them concurrently.
    let (kb_context, chat_context) = tokio::join!(
        gather_kb_context(config, pool, session_id, question),
        history.recent_context(session_id, config.retrieval.max_history_turns),
    );

    let prompt = build_prompt(question, &chat_context, &kb_context);
    let turn_number = turn_number_from_context(&chat_context);

    // Persist the question before streaming begins; a write failure is
    // logged and the answer proceeds without it.
    if let Err(e) = history
        .append_turn(session_id, Role::User, question, turn_number)
        .await
    {
        eprintln!(
            "Warning: failed to store user turn for session {}: {}",
            session_id, e
        );
    }

    let mut llm_rx = llm::stream_chat(&config.llm, SYSTEM_PROMPT, &prompt).await?;

    let (tx, rx) = mpsc::channel::<Result<String>>(32);
    let session_id = session_id.to_string();

    tokio::spawn(async move {
        let mut full_response = String::new();
        let mut interrupted = false;

        while let Some(item) = llm_rx.recv().await {
            match item {
                Ok(token) => {
                    full_response.push_str(&token);
                    if tx.send(Ok(token)).await.is_err() {
                        // Caller went away mid-stream; treat as cancelled.
                        interrupted = true;
                        break;
                    }
                }
                Err(e) => {
                    interrupted = true;
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }

        // Partial answers are not recorded.
        if interrupted {
            return;
        }

        if let Err(e) = history
            .append_turn(&session_id, Role::Assistant, &full_response, turn_number)
            .await
        {
            eprintln!(
                "Warning: failed to store assistant turn for session {}: {}",
                session_id, e
            );
        }
    });

    Ok(rx)
}

/// CLI entry point: stream the answer to stdout.
pub async fn run_ask(
    config: &Config,
    pool: &SqlitePool,
    question: &str,
    session_id: Option<&str>,
) -> Result<()> {
    use std::io::Write;

    let session_id = resolve_session_id(session_id);
    let mut rx = ask(config, pool, &session_id, question).await?;

    let mut stdout = std::io::stdout();
    while let Some(item) = rx.recv().await {
        let token = item?;
        stdout.write_all(token.as_bytes())?;
        stdout.flush()?;
    }
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_both_markers_when_context_is_empty() {
        let prompt = build_prompt("What is the capital?", "", "");
        assert!(prompt.contains(NO_HISTORY_MARKER));
        assert!(prompt.contains(NO_CONTEXT_MARKER));
        assert!(prompt.contains("What is the capital?"));
    }

    #[test]
    fn prompt_uses_supplied_context_blocks() {
        let prompt = build_prompt(
            "Next?",
            "User: hi\nAssistant: hello",
            "Paris is the capital of France.",
        );
        assert!(prompt.contains("User: hi\nAssistant: hello"));
        assert!(prompt.contains("Paris is the capital of France."));
        assert!(!prompt.contains(NO_HISTORY_MARKER));
        assert!(!prompt.contains(NO_CONTEXT_MARKER));
    }

    #[test]
    fn turn_number_starts_at_one() {
        assert_eq!(turn_number_from_context(""), 1);
    }

    #[test]
    fn turn_number_counts_exchanges() {
        let one_exchange = "User: hi\nAssistant: hello";
        assert_eq!(turn_number_from_context(one_exchange), 2);

        let two_exchanges = "User: a\nAssistant: b\nUser: c\nAssistant: d";
        assert_eq!(turn_number_from_context(two_exchanges), 3);
    }

    #[test]
    fn turn_number_is_reproducible() {
        let ctx = "User: a\nAssistant: b\nUser: c\nAssistant: d\nUser: e\nAssistant: f";
        let first = turn_number_from_context(ctx);
        assert_eq!(first, turn_number_from_context(ctx));
        assert_eq!(first, 4);
    }

    #[test]
    fn explicit_session_ids_pass_through() {
        assert_eq!(resolve_session_id(Some("abc-123")), "abc-123");
    }

    #[test]
    fn blank_session_ids_are_replaced() {
        let minted = resolve_session_id(Some("   "));
        assert!(!minted.trim().is_empty());
        assert_ne!(minted, "   ");
        let other = resolve_session_id(None);
        assert_ne!(minted, other);
    }
}
