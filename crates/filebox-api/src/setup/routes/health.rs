//! Health check handlers and response types.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use filebox_storage::{check_health, HealthState};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: &'static str,
    pub storage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Storage reachability check, served on both `/health` and `/health/ready`.
///
/// The check is bounded by `HEALTH_CHECK_TIMEOUT_SECS`; running out of time
/// counts as unhealthy.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(state.config.health_check_timeout_secs);

    let storage = match tokio::time::timeout(timeout, check_health(state.storage.as_ref())).await {
        Ok(health) => health,
        Err(_) => HealthState::Unhealthy(format!(
            "timeout after {}s waiting for storage",
            timeout.as_secs()
        )),
    };

    match storage {
        HealthState::Healthy => (
            StatusCode::OK,
            Json(HealthCheckResponse {
                status: "healthy",
                storage: "healthy",
                detail: None,
            }),
        ),
        HealthState::Unhealthy(detail) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthCheckResponse {
                status: "unhealthy",
                storage: "unhealthy",
                detail: Some(detail),
            }),
        ),
    }
}
