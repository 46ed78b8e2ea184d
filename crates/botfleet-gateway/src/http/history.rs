//! Chat history endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use botfleet_store::types::ChatHistoryEntry;

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/bots/{bot_id}/chat-history
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(bot_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatHistoryEntry>>, ApiError> {
    require_session(&state, &headers)?;
    state.store.get_bot(&bot_id)?;
    Ok(Json(state.store.list_history(&bot_id, q.limit)?))
}

/// DELETE /api/bots/{bot_id}/chat-history — wipe the bot's history.
pub async fn clear(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(bot_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;
    let deleted = state.store.delete_history(&bot_id)?;
    Ok(Json(
        serde_json::json!({ "success": true, "deleted": deleted }),
    ))
}

/// DELETE /api/bots/{bot_id}/chat-history/{msg_id}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((bot_id, msg_id)): Path<(String, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;
    state.store.delete_history_entry(&bot_id, msg_id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
