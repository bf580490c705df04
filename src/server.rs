//! HTTP boundary.
//!
//! Thin plumbing over the upload, ask, and session-deletion pipelines.
//!
//! | Method   | Path                                      | Description |
//! |----------|-------------------------------------------|-------------|
//! | `POST`   | `/documents?session_id=&filename=`        | Upload raw file bytes |
//! | `GET`    | `/chat?question=&session_id=`             | Streamed plain-text answer |
//! | `DELETE` | `/sessions/{id}`                          | Delete all session data |
//! | `GET`    | `/health`                                 | Health check |
//!
//! Error responses carry `{"error": {"code": ..., "message": ...}}`. CORS
//! is permissive to support browser frontends.

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::ask;
use crate::config::Config;
use crate::session;
use crate::upload;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config, pool: SqlitePool) -> anyhow::Result<()> {
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/documents", post(upload_document))
        .route("/chat", get(chat))
        .route("/sessions/{id}", delete(end_session))
        .layer(cors)
        .with_state(state);

    let bind = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    println!("ragchat server listening on {}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Deserialize)]
struct UploadParams {
    session_id: Option<String>,
    filename: Option<String>,
}

async fn upload_document(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Response {
    let session_id = ask::resolve_session_id(params.session_id.as_deref());
    let filename = params.filename.unwrap_or_else(|| "unknown.txt".to_string());

    match upload::ingest_file(&state.config, &state.pool, &session_id, &filename, &body).await {
        Ok(chunks_written) => Json(json!({
            "status": "ok",
            "session_id": session_id,
            "chunks_written": chunks_written,
        }))
        .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upload_failed",
            e.to_string(),
        ),
    }
}

#[derive(Deserialize)]
struct ChatParams {
    question: String,
    session_id: Option<String>,
}

async fn chat(State(state): State<AppState>, Query(params): Query<ChatParams>) -> Response {
    if params.question.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "question must not be empty".to_string(),
        );
    }

    let session_id = ask::resolve_session_id(params.session_id.as_deref());

    let rx = match ask::ask(&state.config, &state.pool, &session_id, &params.question).await {
        Ok(rx) => rx,
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "chat_failed",
                e.to_string(),
            )
        }
    };

    // Forward each token as a body frame; a mid-stream error terminates
    // the body (headers are already out by then).
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(Ok(token)) => Some((Ok(Bytes::from(token)), rx)),
            Some(Err(e)) => Some((Err(std::io::Error::other(e.to_string())), rx)),
            None => None,
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("X-Session-Id", session_id)
        .body(Body::from_stream(stream))
        .unwrap_or_else(|e| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                e.to_string(),
            )
        })
}

async fn end_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match session::delete_session_data(&state.pool, &id).await {
        Ok((chunks, turns)) => Json(json!({
            "status": "ok",
            "session_id": id,
            "chunks_deleted": chunks,
            "turns_deleted": turns,
        }))
        .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "delete_failed",
            e.to_string(),
        ),
    }
}
