//! Bot CRUD and lifecycle control endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use tracing::warn;

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_store::types::{BotPatch, BotRow, NewBot};

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

#[derive(Serialize)]
pub struct BotListItem {
    #[serde(flatten)]
    pub row: BotRow,
    /// Live supervisor truth, reconciled on read.
    #[serde(rename = "isRunning")]
    pub is_running_live: bool,
}

/// GET /api/bots — all bots, reconciling the persisted flag against the
/// supervisor on the way out.
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BotListItem>>, ApiError> {
    require_session(&state, &headers)?;

    let mut out = Vec::new();
    for mut row in state.store.list_bots()? {
        let live = state.supervisor.is_active(&row.id);
        if row.is_running && !live {
            // Row claims a worker that does not exist — repair immediately
            // instead of waiting for the reconciler.
            if let Err(e) = state.store.set_running(&row.id, false) {
                warn!(bot_id = %row.id, error = %e, "failed to reconcile is_running on read");
            }
            row.is_running = false;
        }
        out.push(BotListItem {
            is_running_live: live,
            row,
        });
    }
    Ok(Json(out))
}

/// POST /api/bots
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(new): Json<NewBot>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    if new.name.trim().is_empty()
        || new.token.trim().is_empty()
        || new.api_url.trim().is_empty()
        || new.ai_model.trim().is_empty()
    {
        return Err(ApiError::bad_request("Не все обязательные поля заполнены"));
    }

    let bot = state.store.insert_bot(&new)?;
    state.logs.append(
        LogLevel::Success,
        LogCategory::Bot,
        format!("Бот '{}' создан", bot.name),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true, "botId": bot.id })))
}

/// PUT /api/bots/{id} — hot reload; worker restarts only on token change.
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<BotPatch>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let bot = state.supervisor.clone().update_config(&state, &id, &patch).await?;
    state.logs.append(
        LogLevel::Info,
        LogCategory::Bot,
        format!("Бот '{}' обновлён", bot.name),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true, "bot": bot })))
}

/// POST /api/bots/{id}/toggle
pub async fn toggle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let is_running = state.supervisor.clone().toggle(&state, &id).await?;
    Ok(Json(
        serde_json::json!({ "success": true, "isRunning": is_running }),
    ))
}

/// POST /api/bots/{id}/refresh-info — one-shot getMe + persist.
pub async fn refresh_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let info = state.supervisor.refresh_info(&state, &id).await?;
    Ok(Json(serde_json::json!({ "success": true, "botInfo": info })))
}

/// DELETE /api/bots/{id} — stop first, then cascade-delete.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    state.supervisor.clone().delete(&state, &id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
