//! Core abstractions for the ticket SDK
//!
//! - `Transport`: the four calls the ticket actions make
//!   against the upstream base URL
//! - `ClientBuilder`: builds the configured HTTP client behind it

pub mod builder;
pub use builder::{ClientBuilder, SDP_V3_ACCEPT};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Ordered name/value pairs sent as query string or form fields
pub type FormFields = Vec<(String, String)>;

/// Calls against the upstream service.
///
/// Every call resolves to the parsed JSON body or an error; a non-success
/// status surfaces as `ServiceError::Upstream` with the raw body. Auth
/// headers are the implementation's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `endpoint` with the given query pairs
    async fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value>;

    /// POST a JSON body
    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value>;

    /// POST `application/x-www-form-urlencoded` fields
    async fn post_form(&self, endpoint: &str, fields: &[(String, String)]) -> Result<Value>;

    /// POST `multipart/form-data`, one text part per field
    async fn post_multipart(&self, endpoint: &str, fields: &[(String, String)]) -> Result<Value>;
}
