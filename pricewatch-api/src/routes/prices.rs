//! Price endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pricewatch_core::{Aggregate, AggregateView};
use pricewatch_services::{RefreshOutcome, RefreshStatus};
use serde::Serialize;
use tracing::info;

use super::error_response;
use crate::AppState;

/// Response for aggregate queries
#[derive(Debug, Serialize)]
pub struct ViewsResponse {
    pub aggregate: Aggregate,
    pub currency: String,
    pub views: Vec<AggregateView>,
    pub count: usize,
}

/// Response for the tracked ticker list
#[derive(Debug, Serialize)]
pub struct TickersResponse {
    pub tickers: Vec<String>,
    pub count: usize,
}

/// Response for a manual refresh
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub outcome: RefreshOutcome,
    pub status: RefreshStatus,
}

/// Create price routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/prices/last", get(get_last))
        .route("/prices/avg", get(get_average))
        .route("/prices/min", get(get_min))
        .route("/prices/max", get(get_max))
        .route("/tickers", get(list_tickers))
        .route("/tickers/{ticker}", get(get_ticker))
        .route("/refresh", post(trigger_refresh))
}

async fn get_last(State(state): State<AppState>) -> Response {
    aggregate_response(&state, Aggregate::Last).await
}

async fn get_average(State(state): State<AppState>) -> Response {
    aggregate_response(&state, Aggregate::Average).await
}

async fn get_min(State(state): State<AppState>) -> Response {
    aggregate_response(&state, Aggregate::Min).await
}

async fn get_max(State(state): State<AppState>) -> Response {
    aggregate_response(&state, Aggregate::Max).await
}

async fn aggregate_response(state: &AppState, aggregate: Aggregate) -> Response {
    let service = &state.service;
    let result = match aggregate {
        Aggregate::Last => service.get_last(&state.shutdown).await,
        Aggregate::Average => service.get_average(&state.shutdown).await,
        Aggregate::Min => service.get_min(&state.shutdown).await,
        Aggregate::Max => service.get_max(&state.shutdown).await,
    };

    match result {
        Ok(views) => {
            let count = views.len();
            (
                StatusCode::OK,
                Json(ViewsResponse {
                    aggregate,
                    currency: service.currency().to_string(),
                    views,
                    count,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Latest price for one ticker, tracking it if it is new
async fn get_ticker(State(state): State<AppState>, Path(ticker): Path<String>) -> Response {
    match state.service.get_ticker(&state.shutdown, &ticker).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_tickers(State(state): State<AppState>) -> Response {
    match state.service.tracked_tickers(&state.shutdown).await {
        Ok(tickers) => {
            let count = tickers.len();
            (StatusCode::OK, Json(TickersResponse { tickers, count })).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Run a refresh now, unless the scheduler is already running one
async fn trigger_refresh(State(state): State<AppState>) -> Response {
    let outcome = state.scheduler.trigger(&state.shutdown).await;
    info!("Manual refresh finished: {:?}", outcome);

    (
        StatusCode::OK,
        Json(RefreshResponse {
            outcome,
            status: state.scheduler.status(),
        }),
    )
        .into_response()
}
