//! # Ticket SDK
//!
//! Resilient client for ServiceDesk Plus deployments whose exact API dialect
//! is not known ahead of time.
//!
//! This crate provides:
//!
//! - A `Transport` seam and its `reqwest` implementation
//! - Ordered strategy negotiation for listing tickets and adding notes
//! - Client-side filtering and paging when the server cannot filter
//! - Display identifier resolution and compact ticket views
//! - Error handling and configuration management utilities
//!
//! ## Architecture
//!
//! - `Transport`: GET plus JSON, form and multipart POST against one base URL
//! - `StrategyChain`: tries request shapes in order, first success wins
//! - `TicketActions`: the public entry points, composed from the above
//! - `ServiceError`: error taxonomy shared by every layer

// Re-export core modules
pub mod core;
pub use core::{ClientBuilder, Transport};

// Re-export service-specific modules
pub mod services;
pub use services::servicedesk;
pub use services::servicedesk::{ServiceDeskClient, TicketActions};

// Re-export error handling
pub mod error;
pub use error::{ErrorContext, RejectionReason, Result, ServiceError};

// Re-export negotiation
pub mod negotiation;
pub use negotiation::{Negotiated, StrategyChain};

// Re-export configuration management
pub mod config;
pub use config::{ConfigProvider, ServiceConfig, ServiceDeskConfig};

// Utility module for common functionality
pub mod util;

#[cfg(test)]
mod tests;

/// Create a new default client builder
pub fn client() -> core::ClientBuilder {
    core::ClientBuilder::new()
}

/// Ticket actions over an HTTP client configured from the environment
pub fn ticket_actions_from_env() -> Result<TicketActions> {
    TicketActions::from_config(ServiceDeskConfig::from_env()?)
}
