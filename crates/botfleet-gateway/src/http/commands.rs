//! Command CRUD and multi-command context management.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_store::types::{CommandRow, NewCommand};

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

/// GET /api/bots/{bot_id}/commands
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(bot_id): Path<String>,
) -> Result<Json<Vec<CommandRow>>, ApiError> {
    require_session(&state, &headers)?;
    // 404 for an unknown bot rather than an empty list.
    state.store.get_bot(&bot_id)?;
    Ok(Json(state.store.list_commands(&bot_id)?))
}

/// GET /api/bots/{bot_id}/commands/{cmd_id}
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((bot_id, cmd_id)): Path<(String, String)>,
) -> Result<Json<CommandRow>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(state.store.get_command(&bot_id, &cmd_id)?))
}

/// POST /api/bots/{bot_id}/commands
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(bot_id): Path<String>,
    Json(new): Json<NewCommand>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    if new.name.trim().is_empty() {
        return Err(ApiError::bad_request("Название команды обязательно"));
    }
    state.store.get_bot(&bot_id)?;

    let cmd = state.store.insert_command(&bot_id, &new)?;
    state.logs.append(
        LogLevel::Success,
        LogCategory::Bot,
        format!("Команда '{}' создана", cmd.name),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true, "command": cmd })))
}

/// PUT /api/bots/{bot_id}/commands/{cmd_id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((bot_id, cmd_id)): Path<(String, String)>,
    Json(new): Json<NewCommand>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let cmd = state.store.update_command(&bot_id, &cmd_id, &new)?;
    Ok(Json(serde_json::json!({ "success": true, "command": cmd })))
}

/// DELETE /api/bots/{bot_id}/commands/{cmd_id}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((bot_id, cmd_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    state.store.delete_command(&bot_id, &cmd_id)?;
    // Chats stuck inside a deleted container drop back to the top level.
    state.registry.clear_by_command(&bot_id, &cmd_id);
    Ok(Json(serde_json::json!({ "success": true })))
}

/// DELETE /api/bots/{bot_id}/multi-command-context/{cmd_id} — kick every
/// chat out of the given multi-command.
pub async fn clear_context(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((bot_id, cmd_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let cleared = state.registry.clear_by_command(&bot_id, &cmd_id);
    state.logs.append(
        LogLevel::Info,
        LogCategory::Bot,
        format!("Контекст мульти-команды {cmd_id} очищен ({cleared} чатов)"),
        None,
    );
    Ok(Json(
        serde_json::json!({ "success": true, "clearedCount": cleared }),
    ))
}
