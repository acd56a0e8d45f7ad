//! Error handling for the ticket SDK
//!
//! This module provides the error taxonomy shared by the transport and the
//! ticket actions:
//! - `Upstream` for non-success answers from ServiceDesk Plus (status + raw body)
//! - `NotFound` for identifier lookups that matched nothing
//! - transport-level failures (network, timeout, parsing)
//! - optional context (endpoint, upstream error code) attached to any of them
//!
//! A negotiation that runs out of strategies does not get its own variant:
//! the last attempt's error is handed back untouched.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod mapping;

/// Result type for ticket SDK operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Why the upstream turned a request down, when the transport could tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The request template referenced by the payload was not accepted
    TemplateRejected,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateRejected => write!(f, "template_rejected"),
        }
    }
}

/// Main error type for the ticket SDK
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The upstream answered with a non-success HTTP status
    #[error("[SDP HTTP] {status}: {body}")]
    Upstream {
        status: u16,
        body: String,
        reason: Option<RejectionReason>,
    },

    /// A lookup by identifier produced no record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Response parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

impl ServiceError {
    /// Create an upstream error from a status code and the raw response body
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let reason = mapping::classify_rejection(&body);
        ServiceError::Upstream { status, body, reason }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Network(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parsing(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        ServiceError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// The error without any context wrappers
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Get the upstream error code if available
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ServiceError::WithContext { context, inner } => {
                context.error_code.as_deref().or_else(|| inner.error_code())
            }
            _ => None,
        }
    }

    /// Get the endpoint if available
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ServiceError::WithContext { context, inner } => {
                context.endpoint.as_deref().or_else(|| inner.endpoint())
            }
            _ => None,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::Upstream { status, .. } => Some(*status),
            ServiceError::WithContext { inner, context } => {
                inner.status_code().or(context.status_code)
            }
            _ => None,
        }
    }

    /// Raw upstream response body, for `Upstream` errors
    pub fn upstream_body(&self) -> Option<&str> {
        match self.root() {
            ServiceError::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Classification of an upstream rejection.
    ///
    /// Upstream errors carry the tag assigned by the transport. Any other
    /// error is classified from its rendered message, which keeps failures
    /// raised before the HTTP layer (proxies, decoding) on the same footing.
    pub fn rejection_reason(&self) -> Option<RejectionReason> {
        match self.root() {
            ServiceError::Upstream { reason, .. } => *reason,
            other => mapping::classify_rejection(&other.to_string()),
        }
    }

    /// Whether this is an identifier lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), ServiceError::NotFound(_))
    }

    /// Whether this came back from the upstream as a non-success status
    pub fn is_upstream(&self) -> bool {
        matches!(self.root(), ServiceError::Upstream { .. })
    }

    /// Whether the caller supplied bad input
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), ServiceError::Validation(_))
    }

    /// Whether the process is misconfigured
    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), ServiceError::Configuration(_))
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// Time the error was observed
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Upstream error code (`response_status.messages[].status_code`)
    pub error_code: Option<String>,

    /// Request ID for tracing
    pub request_id: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            error_code: None,
            request_id: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add an error code
    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Add a request ID
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    /// Add a context value and return self (builder pattern)
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.add(key, value);
        self
    }
}

/// Convert reqwest errors to ServiceError
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let context = ErrorContext::for_service("http_client");

        let service_error = if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ServiceError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            ServiceError::network(format!("Request failed: {}", err))
        } else if err.is_redirect() {
            ServiceError::network(format!("Too many redirects: {}", err))
        } else if err.is_decode() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else {
            ServiceError::internal(format!("HTTP client error: {}", err))
        };

        if let Some(status) = err.status() {
            service_error.with_context(context.status_code(status.as_u16()))
        } else {
            service_error.with_context(context)
        }
    }
}

/// Convert serde_json errors to ServiceError
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
