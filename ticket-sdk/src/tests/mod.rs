//! Unit tests for the ticket SDK
//!
//! Cross-module tests. Single-module tests live next to the code.

// Shared transport doubles
pub mod support;
