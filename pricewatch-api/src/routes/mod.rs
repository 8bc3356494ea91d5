//! API route definitions

mod health;
mod prices;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use pricewatch_core::{ErrorKind, PricewatchError};
use serde::Serialize;
use tracing::{error, warn};

use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(prices::routes())
        .merge(health::routes())
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a service error onto a status code and `{ "error": ... }` body
pub fn error_response(err: PricewatchError) -> Response {
    let status = match err.kind() {
        ErrorKind::InvalidParam => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match err.kind() {
        ErrorKind::Internal => error!("Request failed: {}", err),
        ErrorKind::Cancelled => warn!("Request cancelled"),
        _ => {}
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
