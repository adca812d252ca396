//! Health check endpoint.

use super::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Published raffles
    pub raffles: usize,
    /// Seconds since start
    pub uptime_secs: i64,
}

/// Liveness check.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"ok","version":"0.1.0","raffles":1,"uptime_secs":42}
/// ```
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = chrono::Utc::now() - state.started_at;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            raffles: state.service.raffle_count().await,
            uptime_secs: uptime.num_seconds(),
        }),
    )
}
