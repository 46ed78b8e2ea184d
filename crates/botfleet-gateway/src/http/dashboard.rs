//! Dashboard stats and chart endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::require_session;
use crate::http::ApiError;

#[derive(Debug, Clone, Copy)]
enum Period {
    Hour,
    Day,
    Week,
    Month,
}

impl Period {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "1h" => Some(Period::Hour),
            "24h" => Some(Period::Day),
            "7d" => Some(Period::Week),
            "30d" => Some(Period::Month),
            _ => None,
        }
    }

    fn since(self) -> chrono::DateTime<Utc> {
        let now = Utc::now();
        match self {
            Period::Hour => now - Duration::hours(1),
            Period::Day => now - Duration::hours(24),
            Period::Week => now - Duration::days(7),
            Period::Month => now - Duration::days(30),
        }
    }

    /// Bucket format. SQLite strftime and chrono share these directives, so
    /// the same string drives both the SQL grouping and the synthetic labels.
    fn bucket_fmt(self) -> &'static str {
        match self {
            Period::Hour => "%H:%M",
            Period::Day => "%H:00",
            Period::Week | Period::Month => "%m-%d",
        }
    }

    fn bucket_count(self) -> usize {
        match self {
            Period::Hour => 60,
            Period::Day => 24,
            Period::Week => 7,
            Period::Month => 30,
        }
    }

    fn step(self) -> Duration {
        match self {
            Period::Hour => Duration::minutes(1),
            Period::Day => Duration::hours(1),
            Period::Week | Period::Month => Duration::days(1),
        }
    }
}

#[derive(Deserialize)]
pub struct ChartQuery {
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "24h".to_string()
}

/// GET /api/dashboard/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let bots = state.store.list_bots()?;
    let total = bots.len();
    let active = bots.iter().filter(|b| b.is_active).count();
    let running = state.supervisor.active_count();

    Ok(Json(serde_json::json!({
        "totalBots": total,
        "activeBots": active,
        "runningBots": running,
        "requests": state.stats.snapshot(),
        "uptimeSeconds": state.stats.uptime_seconds(),
        "memory": { "rssBytes": rss_bytes() },
    })))
}

/// GET /api/dashboard/charts/messages?period=1h|24h|7d|30d
pub async fn messages_chart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ChartQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let period = Period::parse(&q.period)
        .ok_or_else(|| ApiError::bad_request("Некорректный период"))?;
    let counts = state
        .store
        .message_counts(&period.since().to_rfc3339(), period.bucket_fmt())?;

    let labels: Vec<&str> = counts.iter().map(|(b, _)| b.as_str()).collect();
    let data: Vec<i64> = counts.iter().map(|(_, c)| *c).collect();
    Ok(Json(serde_json::json!({ "labels": labels, "data": data })))
}

/// GET /api/dashboard/charts/ai-requests?period=…
///
/// The series is synthetic: the process counter spread evenly over the
/// period's buckets. Per-call timestamps are not persisted.
pub async fn ai_requests_chart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ChartQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    let period = Period::parse(&q.period)
        .ok_or_else(|| ApiError::bad_request("Некорректный период"))?;

    let n = period.bucket_count();
    let total = state.stats.api_calls();
    let per_bucket = total / n as u64;
    let remainder = (total % n as u64) as usize;

    let start = period.since();
    let mut labels = Vec::with_capacity(n);
    let mut data = Vec::with_capacity(n);
    for i in 0..n {
        let t = start + period.step() * i as i32;
        labels.push(t.format(period.bucket_fmt()).to_string());
        // Spill the remainder over the newest buckets.
        let extra = if n - i <= remainder { 1 } else { 0 };
        data.push(per_bucket + extra);
    }

    Ok(Json(serde_json::json!({ "labels": labels, "data": data })))
}

/// GET /api/dashboard/charts/system — point-in-time snapshot.
pub async fn system_chart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_session(&state, &headers)?;

    Ok(Json(serde_json::json!({
        "memory": { "rssBytes": rss_bytes() },
        "requests": state.stats.snapshot(),
        "uptimeSeconds": state.stats.uptime_seconds(),
        "runningBots": state.supervisor.active_count(),
        "logBufferSize": state.logs.len(),
    })))
}

/// Resident set size from /proc/self/statm (Linux). Zero when unavailable.
fn rss_bytes() -> u64 {
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| {
            s.split_whitespace()
                .nth(1)
                .and_then(|pages| pages.parse::<u64>().ok())
        })
        .map(|pages| pages * 4096)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parsing() {
        assert!(Period::parse("1h").is_some());
        assert!(Period::parse("24h").is_some());
        assert!(Period::parse("7d").is_some());
        assert!(Period::parse("30d").is_some());
        assert!(Period::parse("90d").is_none());
    }

    #[test]
    fn bucket_counts_match_steps() {
        for p in [Period::Hour, Period::Day, Period::Week, Period::Month] {
            let span = p.step() * p.bucket_count() as i32;
            let expected = Utc::now() - p.since();
            // The bucket grid covers the whole period (within a second of
            // clock drift between the two Utc::now calls).
            assert!((span.num_seconds() - expected.num_seconds()).abs() <= 1);
        }
    }
}
