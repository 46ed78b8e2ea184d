//! Support chat — the panel's own assistant, reusing the LLM adapter with a
//! settings-driven target. POST /api/support/chat, blocking or SSE.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_llm::{ChatMessage, LlmTarget, StreamEvent};

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

const FALLBACK_SYSTEM_PROMPT: &str =
    "Ты — помощник службы поддержки панели управления ботами. Отвечай кратко и по делу.";

#[derive(Deserialize)]
pub struct SupportRequest {
    pub message: String,
    #[serde(default)]
    pub stream: bool,
}

/// POST /api/support/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SupportRequest>,
) -> Result<axum::response::Response, ApiError> {
    require_session(&state, &headers)?;

    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("Сообщение не может быть пустым"));
    }

    let (target, system) = support_target(&state)?;
    let messages = vec![ChatMessage::user(req.message.clone())];

    if req.stream {
        return Ok(stream_reply(state, target, system, messages).into_response());
    }

    match state.llm.complete(&target, Some(&system), &messages).await {
        Ok(reply) => Ok((StatusCode::OK, reply).into_response()),
        Err(e) => {
            warn!(error = %e, "support chat failed");
            state.logs.append(
                LogLevel::Error,
                LogCategory::Support,
                format!("Ошибка чата поддержки: {e}"),
                None,
            );
            Ok((StatusCode::OK, e.user_facing_text()).into_response())
        }
    }
}

/// Resolve the support-chat LLM target from the settings table.
fn support_target(state: &AppState) -> Result<(LlmTarget, String), ApiError> {
    let get = |key: &str| state.store.get_setting(key);
    let api_url = get("support_ai_api_url")?.unwrap_or_default();
    let api_key = get("support_ai_api_key")?.unwrap_or_default();
    let model = get("support_ai_model")?.unwrap_or_default();
    let system = get("support_ai_system_prompt")?
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_SYSTEM_PROMPT.to_string());

    if api_url.trim().is_empty() || model.trim().is_empty() {
        return Err(ApiError::bad_request(
            "Настройки AI поддержки не заполнены",
        ));
    }

    Ok((
        LlmTarget {
            api_url,
            api_key,
            model,
        },
        system,
    ))
}

/// SSE stream: `data: {"text": ...}` chunks terminated by `data: [DONE]`.
fn stream_reply(
    state: Arc<AppState>,
    target: LlmTarget,
    system: String,
    messages: Vec<ChatMessage>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);

    tokio::spawn(async move {
        state
            .llm
            .complete_stream(&target, Some(&system), &messages, tx)
            .await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    yield Ok(Event::default().data(
                        serde_json::json!({ "text": text }).to_string(),
                    ));
                }
                StreamEvent::Error { message } => {
                    yield Ok(Event::default().data(
                        serde_json::json!({ "error": message }).to_string(),
                    ));
                }
                StreamEvent::Done => {
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
