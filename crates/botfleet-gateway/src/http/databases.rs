//! Knowledge base CRUD.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use botfleet_core::logbuf::{LogCategory, LogLevel};
use botfleet_store::types::{DatabaseRow, DbKind};

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

#[derive(Deserialize)]
pub struct DatabaseInput {
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: DbKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: String,
}

fn default_kind() -> DbKind {
    DbKind::Text
}

/// GET /api/databases
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DatabaseRow>>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(state.store.list_databases()?))
}

/// GET /api/databases/{id}
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DatabaseRow>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(state.store.get_database(&id)?))
}

/// POST /api/databases
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<DatabaseInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    if input.name.trim().is_empty() {
        return Err(ApiError::bad_request("Название базы знаний обязательно"));
    }

    let db = state.store.insert_database(
        &input.name,
        input.kind,
        input.description.as_deref(),
        &input.content,
    )?;
    state.logs.append(
        LogLevel::Success,
        LogCategory::Database,
        format!("База знаний '{}' создана", db.name),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true, "database": db })))
}

/// PUT /api/databases/{id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<DatabaseInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let db = state.store.update_database(
        &id,
        &input.name,
        input.kind,
        input.description.as_deref(),
        &input.content,
    )?;
    state.logs.append(
        LogLevel::Info,
        LogCategory::Database,
        format!("База знаний '{}' обновлена", db.name),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true, "database": db })))
}

/// DELETE /api/databases/{id} — refused while a bot references it.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    state.store.delete_database(&id)?;
    state.logs.append(
        LogLevel::Info,
        LogCategory::Database,
        format!("База знаний {id} удалена"),
        None,
    );
    Ok(Json(serde_json::json!({ "success": true })))
}
