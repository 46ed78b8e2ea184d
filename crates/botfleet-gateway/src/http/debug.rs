//! Operator debug endpoints over the log ring and request counters.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use botfleet_core::logbuf::{LogCategory, LogLevel};

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_limit() -> usize {
    100
}

/// GET /api/debug/logs?limit&level&category
pub async fn logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<LogsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let level = match q.level.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<LogLevel>()
                .map_err(|_| ApiError::bad_request("Некорректный уровень логов"))?,
        ),
        None => None,
    };
    let category = match q.category.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<LogCategory>()
                .map_err(|_| ApiError::bad_request("Некорректная категория логов"))?,
        ),
        None => None,
    };

    let entries = state.logs.read(q.limit, level, category);
    Ok(Json(serde_json::json!({
        "logs": entries,
        "total": state.logs.len(),
    })))
}

/// GET /api/debug/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    Ok(Json(serde_json::json!({
        "requests": state.stats.snapshot(),
        "uptimeSeconds": state.stats.uptime_seconds(),
        "activeBots": state.supervisor.active_ids(),
    })))
}
