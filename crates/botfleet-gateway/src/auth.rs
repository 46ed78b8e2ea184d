//! Session-cookie authentication for the admin API.
//!
//! Sessions live in memory: a process restart logs every operator out, which
//! is acceptable for a single-operator panel. Passwords verify against
//! bcrypt hashes in the users table.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use botfleet_core::config::SESSION_COOKIE;
use botfleet_core::logbuf::{LogCategory, LogLevel};

use crate::app::AppState;
use crate::http::ApiError;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/auth/login — verify credentials, set the session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match state.store.find_user_by_email(&req.email) {
        Ok(Some(user)) => user,
        _ => return reject_login(&state, &req.email),
    };

    let ok = bcrypt::verify(&req.password, &user.password_hash).unwrap_or(false);
    if !ok {
        return reject_login(&state, &req.email);
    }

    let session_id = Uuid::new_v4().to_string();
    state.sessions.insert(session_id.clone(), user.email.clone());
    state.logs.append(
        LogLevel::Success,
        LogCategory::Auth,
        format!("Вход выполнен: {}", user.email),
        None,
    );

    let cookie = format!("{SESSION_COOKIE}={session_id}; HttpOnly; SameSite=Lax; Path=/");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            message: "Вход выполнен".to_string(),
        }),
    )
        .into_response()
}

fn reject_login(state: &AppState, email: &str) -> axum::response::Response {
    state.logs.append(
        LogLevel::Warning,
        LogCategory::Auth,
        format!("Неудачная попытка входа: {email}"),
        None,
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(LoginResponse {
            success: false,
            message: "Неверный email или пароль".to_string(),
        }),
    )
        .into_response()
}

/// POST /api/auth/logout — destroy the session.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(session_id) = session_cookie(&headers) {
        state.sessions.remove(&session_id);
    }
    let expired = format!("{SESSION_COOKIE}=; HttpOnly; Path=/; Max-Age=0");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, expired)],
        Json(serde_json::json!({ "success": true })),
    )
}

/// GET /api/auth/check
pub async fn check(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let authenticated = authenticated(&state, &headers);
    Json(serde_json::json!({ "authenticated": authenticated }))
}

/// Guard used by every authenticated handler.
pub fn require_session(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if authenticated(state, headers) {
        Ok(())
    } else {
        Err(ApiError::unauthorized())
    }
}

fn authenticated(state: &AppState, headers: &HeaderMap) -> bool {
    session_cookie(headers)
        .map(|id| state.sessions.contains_key(&id))
        .unwrap_or(false)
}

/// Extract the session id from the Cookie header.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_parsed_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; botfleet_session=abc123; lang=ru"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_cookie_is_none() {
        let headers = HeaderMap::new();
        assert!(session_cookie(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert!(session_cookie(&headers).is_none());
    }
}
