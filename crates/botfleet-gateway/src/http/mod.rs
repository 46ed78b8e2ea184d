//! Admin HTTP handlers.

pub mod bots;
pub mod commands;
pub mod dashboard;
pub mod databases;
pub mod debug;
pub mod history;
pub mod settings;
pub mod support;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use botfleet_store::StoreError;
use botfleet_supervisor::SupervisorError;

use crate::app::AppState;

/// Uniform error body for the admin API, carrying a Russian operator-facing
/// message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Требуется авторизация".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { what, id } => {
                ApiError::not_found(format!("Не найдено: {what} {id}"))
            }
            StoreError::NameTaken { name } => {
                ApiError::bad_request(format!("Команда с именем '{name}' уже существует"))
            }
            StoreError::DatabaseInUse { .. } => ApiError::bad_request(
                "База знаний используется ботами и не может быть удалена".to_string(),
            ),
            StoreError::InvalidJson(e) => {
                ApiError::bad_request(format!("Некорректный JSON: {e}"))
            }
            other => ApiError::internal(format!("Внутренняя ошибка: {other}")),
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::Store(e) => e.into(),
            SupervisorError::Telegram(msg) => {
                ApiError::internal(format!("Ошибка Telegram: {msg}"))
            }
        }
    }
}

/// Middleware: count every admin request into RequestStats.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if response.status().is_server_error() {
        state.stats.record_failure();
    } else {
        state.stats.record_success();
    }
    response
}
