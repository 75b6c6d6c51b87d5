//! Health check endpoint handlers.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::HEALTH_TAG;
use crate::api::dto::{ComponentHealth, HealthResponse, HealthStatus};
use crate::state::AppState;

/// Creates health check routes.
///
/// # Routes
/// - `GET /api/health` - Service and database status
/// - `GET /api/health/ready` - Readiness probe
/// - `GET /api/health/live` - Liveness probe
pub fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health_check))
        .routes(routes!(readiness_check))
        .routes(routes!(liveness_check))
}

#[utoipa::path(
    get,
    path = "/",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();
    checks.insert("database".to_string(), check_database(&state).await);

    let response = HealthResponse::from_checks(crate::pkg_version(), checks);
    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(response))
}

/// Ready once the database answers.
#[utoipa::path(
    get,
    path = "/ready",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    )
)]
async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match check_database(&state).await.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded | HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Answers without touching dependencies.
#[utoipa::path(
    get,
    path = "/live",
    tag = HEALTH_TAG,
    responses(
        (status = 200, description = "Service is alive")
    )
)]
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

async fn check_database(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    let result = state.services.categories.health_check().await;
    let response_time_ms = Some(start.elapsed().as_millis() as u64);

    match result {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            message: Some("Connected".to_string()),
            response_time_ms,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            ComponentHealth {
                status: HealthStatus::Unhealthy,
                message: Some(format!("Database check failed: {}", e)),
                response_time_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness_check() {
        assert_eq!(liveness_check().await, StatusCode::OK);
    }
}
