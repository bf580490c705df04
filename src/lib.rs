//! # ragchat
//!
//! A session-scoped retrieval-augmented chat service.
//!
//! ragchat ingests user documents (PDF, DOCX, XLSX, CSV, JSON, HTML, plain
//! text), chunks and embeds them into a per-session SQLite knowledge base,
//! and answers questions against that knowledge base plus the session's own
//! chat history, streaming tokens from an OpenAI-compatible chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────────┐
//! │ Documents │──▶│   Upload     │──▶│    SQLite      │
//! │ pdf/docx/…│   │ Chunk+Embed │   │ chunks+turns  │
//! └──────────┘   └─────────────┘   └──────┬────────┘
//!                                         │
//!                      ┌──────────────────┤
//!                      ▼                  ▼
//!                 ┌──────────┐      ┌──────────┐
//!                 │   Ask    │◀────▶│ History  │
//!                 │ retrieve │      │  turns   │
//!                 └────┬─────┘      └──────────┘
//!                      ▼
//!                 ┌──────────┐
//!                 │   LLM    │
//!                 │  stream  │
//!                 └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragchat init                          # create database
//! ragchat upload report.pdf --session s1
//! ragchat ask "what does the report conclude?" --session s1
//! ragchat history s1                    # show conversation
//! ragchat end-session s1                # delete all session data
//! ragchat serve                         # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format document text extraction |
//! | [`chunk`] | Sentence-based text chunking |
//! | [`embedding`] | Embedding backends and vector utilities |
//! | [`store`] | Per-session vector knowledge store |
//! | [`history`] | Append-only chat history |
//! | [`llm`] | Streaming chat completion client |
//! | [`ask`] | Retrieval-augmented question answering |
//! | [`upload`] | Document ingestion pipeline |
//! | [`session`] | Session deletion |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup and maintenance |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod history;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod server;
pub mod session;
pub mod store;
pub mod upload;
