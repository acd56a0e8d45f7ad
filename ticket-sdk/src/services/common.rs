//! Common utilities for service clients

use std::fmt;

use crate::error::{ErrorContext, ServiceError};

/// UserAgent structure for identifying the client to upstream services
#[derive(Debug, Clone)]
pub struct UserAgent {
    /// Application name
    pub app_name: String,

    /// Version string
    pub version: String,

    /// Optional extra info
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "ServiceDesk-Bridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some("ticket-sdk".to_string()),
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// Create error context for an upstream call
pub fn create_error_context(
    service_name: &str,
    endpoint: &str,
    status: Option<reqwest::StatusCode>,
) -> ErrorContext {
    let mut context = ErrorContext::for_service(service_name).endpoint(endpoint);

    if let Some(status_code) = status {
        context = context.status_code(status_code.as_u16());
    }

    context
}

/// Turn a non-success HTTP response into an upstream error with context
pub async fn parse_error_response(
    service_name: &str,
    endpoint: &str,
    response: reqwest::Response,
) -> ServiceError {
    let status = response.status();
    let mut context = create_error_context(service_name, endpoint, Some(status));

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("Failed to read error response: {}", e),
    };

    crate::error::mapping::map_http_error(status, &body, &mut context).with_context(context)
}
