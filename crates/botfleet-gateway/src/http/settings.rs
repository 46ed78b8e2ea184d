//! Settings endpoints (support-chat configuration keys).

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_store::types::Setting;

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

/// GET /api/settings
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Setting>>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(state.store.list_settings()?))
}

/// PUT /api/settings — upsert an array of {key, value}.
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(settings): Json<Vec<Setting>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    for setting in &settings {
        state.store.set_setting(&setting.key, &setting.value)?;
    }
    state.logs.append(
        LogLevel::Info,
        LogCategory::Settings,
        format!("Настройки обновлены ({} ключей)", settings.len()),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true })))
}
