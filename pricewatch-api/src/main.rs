//! Pricewatch API Server
//!
//! Keeps a history of crypto spot prices fresh on a schedule and serves
//! last/avg/min/max views over it.

mod config;
mod routes;

use anyhow::Context;
use axum::{
    http::{header, Method},
    Router,
};
use config::AppConfig;
use pricewatch_cryptocompare::CryptoCompareClient;
use pricewatch_services::{
    AggregationConfig, AggregationService, RefreshScheduler, RefreshSchedulerConfig,
    SnapshotStorage,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AggregationService>,
    pub scheduler: Arc<RefreshScheduler>,
    /// Cancelled on shutdown; in-flight service calls observe it
    pub shutdown: CancellationToken,
}

/// Build the HTTP router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Not an error if the file doesn't exist
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pricewatch_api=debug")),
        )
        .init();

    info!("Starting Pricewatch API");

    let config = AppConfig::from_env().context("Invalid configuration")?;

    info!("Initializing snapshot storage at: {}", config.db_path);
    let storage = Arc::new(
        SnapshotStorage::new(&config.db_path).context("Failed to initialize snapshot storage")?,
    );

    let mut quotes = CryptoCompareClient::with_base_url(&config.cryptocompare_base_url)
        .context("Failed to create CryptoCompare client")?;
    info!("Fetching quotes from {}", quotes.base_url());
    if let Some(key) = &config.cryptocompare_api_key {
        quotes = quotes.with_api_key(key.clone());
    } else {
        info!("No CryptoCompare API key configured, using anonymous access");
    }

    let service = Arc::new(
        AggregationService::new(
            storage,
            Arc::new(quotes),
            AggregationConfig {
                currency: config.quote_currency.clone(),
            },
        )
        .context("Failed to create aggregation service")?,
    );

    let shutdown = CancellationToken::new();

    if !config.tracked_tickers.is_empty() {
        let added = service
            .track(&shutdown, &config.tracked_tickers)
            .await
            .context("Failed to register seed tickers")?;
        info!(
            "Registered {} new of {} seed tickers",
            added,
            config.tracked_tickers.len()
        );
    }

    let scheduler = Arc::new(RefreshScheduler::new(
        service.clone(),
        RefreshSchedulerConfig {
            interval_secs: config.refresh_interval_secs,
        },
    ));

    let scheduler_handle = tokio::spawn(scheduler.clone().run(shutdown.child_token()));

    let state = AppState {
        service,
        scheduler,
        shutdown: shutdown.clone(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Refresh scheduler task failed: {}", e);
    }

    info!("Pricewatch API stopped");
    Ok(())
}

/// Resolves on Ctrl-C, cancelling `shutdown`
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
