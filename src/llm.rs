//! Streaming chat-completion client.
//!
//! Talks to any OpenAI-compatible `POST {base_url}/chat/completions`
//! endpoint with `stream: true` and forwards the SSE token fragments
//! (`choices[0].delta.content`) over a bounded channel, in arrival order,
//! as soon as they land. The receiver side owns cancellation: dropping the
//! receiver stops the forwarding task, which is how an interrupted answer
//! avoids being persisted.

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::LlmConfig;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Start a streaming completion and return the token receiver.
///
/// Fails before any token is emitted if the key is missing, the request
/// cannot be built, or the endpoint answers with a non-success status. A
/// mid-stream transport error arrives as an `Err` item on the channel.
pub async fn stream_chat(
    config: &LlmConfig,
    system: &str,
    user: &str,
) -> Result<mpsc::Receiver<Result<String>>> {
    let api_key = std::env::var(&config.api_key_env)
        .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to build LLM HTTP client")?;

    let body = ChatRequest {
        model: &config.model,
        stream: true,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
    };

    let response = client
        .post(format!("{}/chat/completions", config.base_url))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .context("failed to call chat completions endpoint")?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        bail!("LLM API error {}: {}", status, text);
    }

    let (tx, rx) = mpsc::channel::<Result<String>>(32);

    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        'outer: while let Some(item) = stream.next().await {
            let bytes = match item {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx.send(Err(anyhow::anyhow!("stream error: {}", e))).await;
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            // SSE events are newline-delimited; a partial line stays in
            // the buffer until its terminator arrives.
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    break 'outer;
                }
                if let Some(token) = parse_delta_content(data) {
                    // Receiver dropped means the caller cancelled; stop
                    // forwarding and let the partial answer be discarded.
                    if tx.send(Ok(token)).await.is_err() {
                        return;
                    }
                }
            }
        }
    });

    Ok(rx)
}

/// Pull `choices[0].delta.content` out of one SSE data payload. Fragments
/// without content (role announcements, finish markers) yield `None`.
fn parse_delta_content(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let content = value
        .get("choices")?
        .as_array()?
        .first()?
        .get("delta")?
        .get("content")?
        .as_str()?;
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_content_is_extracted() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"},"index":0}]}"#;
        assert_eq!(parse_delta_content(data), Some("Hel".to_string()));
    }

    #[test]
    fn role_announcement_yields_no_token() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        assert_eq!(parse_delta_content(data), None);
    }

    #[test]
    fn finish_fragment_yields_no_token() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_delta_content(data), None);
    }

    #[test]
    fn malformed_payload_yields_no_token() {
        assert_eq!(parse_delta_content("not json"), None);
    }
}
