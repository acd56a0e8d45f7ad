//! Client builder implementation
//!
//! Builds the `reqwest` client used by the ServiceDesk Plus transport, with
//! the v3 accept header and technician-key authentication baked in.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client as ReqwestClient;

use crate::config::ServiceDeskConfig;
use crate::error::{Result, ServiceError};
use crate::services::UserAgent;

/// Media type ServiceDesk Plus v3 answers with
pub const SDP_V3_ACCEPT: &str = "application/vnd.manageengine.sdp.v3+json";

/// Unified client builder
pub struct ClientBuilder {
    /// Technician auth token
    auth_token: Option<String>,

    /// Custom headers to include with all requests
    custom_headers: HashMap<String, String>,

    /// Request timeout
    timeout: Option<Duration>,

    /// User agent
    user_agent: Option<String>,

    /// Enable response compression
    compression: bool,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            auth_token: None,
            custom_headers: HashMap::new(),
            timeout: Some(Duration::from_secs(20)),
            user_agent: Some(UserAgent::default().to_string()),
            compression: true,
        }
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded ServiceDesk configuration
    pub fn from_config(config: &ServiceDeskConfig) -> Self {
        Self::new()
            .auth_token(config.api_key.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
    }

    /// Set the technician auth token
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a custom header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(key.into(), value.into());
        self
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enable or disable compression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Default headers sent with every request
    pub fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(SDP_V3_ACCEPT));

        for (key, value) in &self.custom_headers {
            let header_name = HeaderName::from_str(key)
                .map_err(|e| ServiceError::configuration(format!("Invalid header name: {}", e)))?;

            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ServiceError::configuration(format!("Invalid header value: {}", e)))?;

            headers.insert(header_name, header_value);
        }

        // Older builds only look at TECHNICIAN_KEY, newer ones at Authorization.
        if let Some(ref token) = self.auth_token {
            let mut authorization = HeaderValue::from_str(&format!("authtoken: {}", token))
                .map_err(|e| ServiceError::configuration(format!("Invalid auth header: {}", e)))?;
            authorization.set_sensitive(true);
            headers.insert(AUTHORIZATION, authorization);

            let mut technician_key = HeaderValue::from_str(token)
                .map_err(|e| ServiceError::configuration(format!("Invalid auth header: {}", e)))?;
            technician_key.set_sensitive(true);
            headers.insert(HeaderName::from_static("technician_key"), technician_key);
        }

        Ok(headers)
    }

    /// Build an HTTP client with the configured settings
    pub fn build_http_client(&self) -> Result<ReqwestClient> {
        let mut builder = ReqwestClient::builder();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        builder = builder.gzip(self.compression);
        builder = builder.default_headers(self.default_headers()?);

        builder
            .build()
            .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))
    }
}
