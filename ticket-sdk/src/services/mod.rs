//! Service-specific client implementations
//!
//! This module contains the upstream ticketing client and the ticket actions
//! built on top of it.

pub mod servicedesk;
mod common;

pub use common::UserAgent;
