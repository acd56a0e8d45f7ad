// servicedesk-bridge-rs/src/main.rs
// ServiceDesk Plus bridge - HTTP entry point for ticket intents
//
// Loads .env, opens the trace ledger, prunes records past retention and
// serves the routes from the library crate.

use std::sync::Arc;

use servicedesk_bridge::{open_trace_ledger, router, AppState, BridgeConfig, START_TIME};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let _ = *START_TIME;

    let config = BridgeConfig::from_env();
    let actions = ticket_sdk::ticket_actions_from_env()?;

    let ledger = open_trace_ledger(&config.trace);

    if config.dev_trace_enabled {
        tracing::warn!("Dev trace viewer enabled at /meta/trace/recent");
    }

    let state = AppState {
        actions,
        ledger: Arc::new(ledger),
        dev_trace_enabled: config.dev_trace_enabled,
    };

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("ServiceDesk bridge starting on {}", addr);
    tracing::info!("Trace ledger at {}", config.trace.path.display());

    axum::serve(listener, router(state)).await?;

    Ok(())
}
