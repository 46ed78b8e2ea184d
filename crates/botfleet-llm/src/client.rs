//! Multi-provider LLM client.
//!
//! One client serves every bot: the provider family is re-inferred from the
//! target URL on each call, so an operator can repoint a bot at a different
//! provider without restarting anything.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use botfleet_core::stats::RequestStats;

use crate::error::LlmError;
use crate::family::ProviderFamily;
use crate::request::build_body;
use crate::response::extract_text;
use crate::stream::{delta_text, parse_sse_line, SseParsed, StreamEvent};
use crate::types::{ChatMessage, LlmTarget};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct LlmClient {
    http: reqwest::Client,
    stats: Arc<RequestStats>,
}

impl LlmClient {
    pub fn new(stats: Arc<RequestStats>) -> Self {
        Self {
            http: reqwest::Client::new(),
            stats,
        }
    }

    /// Blocking call: send the conversation, wait for the full reply text.
    pub async fn complete(
        &self,
        target: &LlmTarget,
        system: Option<&str>,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        self.stats.record_api_call();
        let family = ProviderFamily::detect(&target.api_url);
        let body = build_body(family, &target.model, system, messages, false);

        debug!(model = %target.model, family = ?family, "sending LLM request");

        let resp = self.post(family, target, &body).send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "LLM API error");
            return Err(LlmError::Api {
                status,
                message: text,
            });
        }

        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        extract_text(family, &parsed).ok_or(LlmError::Empty)
    }

    /// Streaming call. OpenAI-shaped providers stream true SSE deltas; the
    /// rest fall back to one blocking call emitted as a single chunk.
    ///
    /// The channel always ends with `Done`, possibly preceded by `Error`.
    pub async fn complete_stream(
        &self,
        target: &LlmTarget,
        system: Option<&str>,
        messages: &[ChatMessage],
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let family = ProviderFamily::detect(&target.api_url);

        if !family.supports_streaming() {
            match self.complete(target, system, messages).await {
                Ok(text) => {
                    let _ = tx.send(StreamEvent::TextDelta { text }).await;
                }
                Err(e) => {
                    let _ = tx
                        .send(StreamEvent::Error {
                            message: e.user_facing_text(),
                        })
                        .await;
                }
            }
            let _ = tx.send(StreamEvent::Done).await;
            return;
        }

        self.stats.record_api_call();
        let body = build_body(family, &target.model, system, messages, true);

        debug!(model = %target.model, family = ?family, "sending streaming LLM request");

        let resp = match self.post(family, target, &body).send().await {
            Ok(r) => r,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error {
                        message: LlmError::Http(e).user_facing_text(),
                    })
                    .await;
                let _ = tx.send(StreamEvent::Done).await;
                return;
            }
        };

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "LLM streaming API error");
            let _ = tx
                .send(StreamEvent::Error {
                    message: LlmError::Api {
                        status,
                        message: text,
                    }
                    .user_facing_text(),
                })
                .await;
            let _ = tx.send(StreamEvent::Done).await;
            return;
        }

        process_sse_stream(resp, tx).await;
    }

    fn post(
        &self,
        family: ProviderFamily,
        target: &LlmTarget,
        body: &serde_json::Value,
    ) -> reqwest::RequestBuilder {
        let url = family.endpoint(&target.api_url, &target.api_key);
        let mut req = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .json(body);

        // Gemini authenticates via the key in the query string.
        if family != ProviderFamily::Gemini {
            req = req.bearer_auth(&target.api_key);
        }
        if family == ProviderFamily::Anthropic {
            req = req.header("anthropic-version", ANTHROPIC_VERSION);
        }
        req
    }
}

/// Consume an OpenAI-format SSE body, forwarding text deltas until
/// `data: [DONE]` or the connection ends.
async fn process_sse_stream(resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    use futures_util::StreamExt;

    let mut line_buf = String::new();
    let mut byte_stream = resp.bytes_stream();

    'outer: while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                break;
            }
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };

        line_buf.push_str(text);
        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(SseParsed::Data(data)) = parse_sse_line(line) {
                if data.trim() == "[DONE]" {
                    break 'outer;
                }
                if let Some(delta) = delta_text(&data) {
                    if tx.send(StreamEvent::TextDelta { text: delta }).await.is_err() {
                        return; // receiver dropped
                    }
                }
            }
        }

        line_buf = remainder;
    }

    let _ = tx.send(StreamEvent::Done).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn unreachable_target(api_url: &str) -> LlmTarget {
        LlmTarget {
            api_url: api_url.to_string(),
            api_key: "k".to_string(),
            model: "m".to_string(),
        }
    }

    #[tokio::test]
    async fn streaming_against_non_streaming_provider_ends_with_done() {
        // Anthropic-family URLs never stream; the client falls back to one
        // blocking call. The call itself fails (nothing listens on the
        // discard port), so the fallback surfaces Error then Done.
        let stats = Arc::new(RequestStats::new());
        let client = LlmClient::new(stats);
        let target = unreachable_target("http://127.0.0.1:9/anthropic.com/v1/messages");
        let messages = [ChatMessage {
            role: Role::User,
            content: "hi".to_string(),
        }];

        let (tx, mut rx) = mpsc::channel(8);
        client.complete_stream(&target, None, &messages, tx).await;

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert!(matches!(events.first(), Some(StreamEvent::Error { .. })));
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn blocking_call_counts_api_calls() {
        let stats = Arc::new(RequestStats::new());
        let client = LlmClient::new(stats.clone());
        let target = unreachable_target("http://127.0.0.1:9/v1");
        let messages = [ChatMessage {
            role: Role::User,
            content: "hi".to_string(),
        }];

        let result = client.complete(&target, None, &messages).await;
        assert!(result.is_err());
        assert_eq!(stats.api_calls(), 1);
    }
}
