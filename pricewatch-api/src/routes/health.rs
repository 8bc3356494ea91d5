//! Health check endpoints

use axum::{extract::State, response::Json, routing::get, Router};
use pricewatch_services::{RefreshOutcome, RefreshStatus};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    currency: String,
    refresh: RefreshStatus,
}

/// Health check handler
///
/// Reports "degraded" when the most recent refresh failed.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let refresh = state.scheduler.status();

    let status = match refresh.last_outcome {
        Some(RefreshOutcome::Failed) => "degraded",
        _ => "healthy",
    };

    Json(HealthResponse {
        status,
        currency: state.service.currency().to_string(),
        refresh,
    })
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
