//! # ragchat CLI
//!
//! The `ragchat` binary drives the session-scoped retrieval-augmented chat
//! pipeline: database initialization, document upload, question answering,
//! history inspection, session teardown, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! ragchat --config ./config/ragchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragchat init` | Create the SQLite database and schema |
//! | `ragchat upload <files...>` | Extract, chunk, embed, and store documents |
//! | `ragchat ask "<question>"` | Ask a question; the answer streams to stdout |
//! | `ragchat history <session>` | Print the session's conversation |
//! | `ragchat end-session <session>` | Delete all data for a session |
//! | `ragchat reset --yes` | Wipe every session (maintenance) |
//! | `ragchat serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragchat::{ask, config, db, history, migrate, server, session, upload};

/// ragchat — session-scoped retrieval-augmented chat over your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Session-scoped retrieval-augmented chat over your documents",
    version,
    long_about = "ragchat ingests documents (PDF, DOCX, XLSX, CSV, JSON, HTML, plain text) into \
    a per-session knowledge base, then answers questions against that knowledge base plus the \
    session's chat history, streaming tokens from an OpenAI-compatible chat model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ragchat.toml`. Database, chunking, retrieval,
    /// embedding, LLM, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and both tables (kb_chunks,
    /// chat_turns). This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Upload documents into a session's knowledge base.
    ///
    /// Extracts text from each file, splits it into sentence-based chunks,
    /// embeds the chunks, and stores them under the given session. Files
    /// that fail to read or extract are skipped with a warning.
    Upload {
        /// Paths of the files to upload.
        files: Vec<PathBuf>,

        /// Session to upload into. A fresh session id is minted if omitted.
        #[arg(long)]
        session: Option<String>,
    },

    /// Ask a question against a session's knowledge base.
    ///
    /// Retrieves the most relevant chunks and recent chat history, sends
    /// them to the chat model, and streams the answer to stdout. Both sides
    /// of the exchange are recorded in the session's history.
    Ask {
        /// The question to ask.
        question: String,

        /// Session to ask within. A fresh session id is minted if omitted.
        #[arg(long)]
        session: Option<String>,
    },

    /// Print a session's conversation history.
    History {
        /// Session id.
        session: String,

        /// Maximum number of exchanges to show.
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Delete all data for a session.
    ///
    /// Removes the session's knowledge-base chunks and chat turns. Safe to
    /// run on a session that does not exist.
    EndSession {
        /// Session id.
        session: String,
    },

    /// Wipe every session from the database.
    ///
    /// Deletes all knowledge-base chunks and chat turns across all sessions.
    /// Requires `--yes`; nothing else ever triggers this.
    Reset {
        /// Confirm the wipe.
        #[arg(long)]
        yes: bool,
    },

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// upload, chat, and session endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::ensure_schema(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { files, session } => {
            if files.is_empty() {
                anyhow::bail!("no files given; pass one or more paths to upload");
            }
            let pool = db::connect(&cfg).await?;
            let session_id = ask::resolve_session_id(session.as_deref());
            upload::run_upload(&cfg, &pool, &session_id, &files).await?;
        }
        Commands::Ask { question, session } => {
            let pool = db::connect(&cfg).await?;
            ask::run_ask(&cfg, &pool, &question, session.as_deref()).await?;
        }
        Commands::History { session, limit } => {
            let pool = db::connect(&cfg).await?;
            let hist = history::ChatHistory::new(pool);
            let context = hist.recent_context(&session, limit).await;
            if context.is_empty() {
                println!("No history for session {}.", session);
            } else {
                println!("{}", context);
            }
        }
        Commands::EndSession { session } => {
            let pool = db::connect(&cfg).await?;
            let (chunks, turns) = session::delete_session_data(&pool, &session).await?;
            println!(
                "Deleted session {} ({} chunks, {} turns).",
                session, chunks, turns
            );
        }
        Commands::Reset { yes } => {
            if !yes {
                anyhow::bail!("refusing to wipe all sessions without --yes");
            }
            let pool = db::connect(&cfg).await?;
            let (chunks, turns) = migrate::wipe_all(&pool).await?;
            println!("Wiped {} chunks and {} turns.", chunks, turns);
        }
        Commands::Serve => {
            let pool = db::connect(&cfg).await?;
            migrate::ensure_schema(&pool).await?;
            server::run_server(&cfg, pool).await?;
        }
    }

    Ok(())
}
