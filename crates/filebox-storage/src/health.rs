use crate::Storage;
use serde::Serialize;

/// Reachability of the storage backend at the time of a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy(String),
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            HealthState::Healthy => None,
            HealthState::Unhealthy(detail) => Some(detail),
        }
    }
}

/// Probe the backend with a listing.
///
/// Read-only. Any successful listing, empty or not, is healthy. Unbounded:
/// the caller applies the timeout.
pub async fn check_health(storage: &dyn Storage) -> HealthState {
    match storage.list_names().await {
        Ok(names) => {
            tracing::debug!(
                backend = %storage.backend_type(),
                objects = names.len(),
                "Storage health check passed"
            );
            HealthState::Healthy
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                backend = %storage.backend_type(),
                "Storage health check failed"
            );
            HealthState::Unhealthy(e.to_string())
        }
    }
}
