//! HTTP surface over the ticket actions.
//!
//! Routes take their arguments from the query string and answer with the
//! facade's JSON. Every call outcome is appended to the trace ledger.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Router,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use ticket_sdk::TicketActions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use trace_ledger::{TraceLedger, TraceLedgerConfig};

pub mod config;
pub mod error;
pub mod handlers;

pub use config::BridgeConfig;
pub use error::ApiError;


pub static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub actions: TicketActions,
    pub ledger: Arc<TraceLedger>,
    pub dev_trace_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Create the Axum router with all routes and middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/announcements/active", get(handlers::announcements_handler))
        .route("/intents/create", post(handlers::create_handler))
        .route("/intents/status", get(handlers::status_handler))
        .route(
            "/intents/status_by_display",
            get(handlers::status_by_display_handler),
        )
        .route("/intents/note", post(handlers::note_handler))
        .route(
            "/intents/note_by_display",
            post(handlers::note_by_display_handler),
        )
        .route("/meta/sites", get(handlers::sites_handler))
        .route("/meta/request_templates", get(handlers::templates_handler))
        .route("/meta/trace/recent", get(handlers::trace_recent_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Open the configured trace ledger and prune it to the retention window.
///
/// A ledger that cannot be opened is replaced by an in-memory one so the
/// bridge keeps serving; its records are then lost on exit.
pub fn open_trace_ledger(config: &TraceLedgerConfig) -> TraceLedger {
    let ledger = match TraceLedger::open(config.path.clone()) {
        Ok(ledger) => ledger,
        Err(err) => {
            tracing::error!(
                "Trace ledger at {} unusable, recording in memory only: {}",
                config.path.display(),
                err
            );
            return TraceLedger::in_memory();
        }
    };

    match ledger.prune_older_than(config.retention_days) {
        Ok(0) => {}
        Ok(removed) => tracing::info!(
            "Pruned {} trace records older than {} days",
            removed,
            config.retention_days
        ),
        Err(err) => tracing::warn!("Trace pruning failed: {}", err),
    }

    ledger
}
