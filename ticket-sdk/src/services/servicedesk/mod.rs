//! ServiceDesk Plus client implementation
//!
//! `ServiceDeskClient` is the HTTP side of [`Transport`]. The modules below it
//! hold the ticket logic, all written against the trait so they can run
//! against a scripted transport in tests.

mod actions;
mod compact;
mod extract;
mod listing;
mod models;
mod notes;
mod payload;
mod resolve;

pub use actions::TicketActions;
pub use compact::compact_ticket;
pub use extract::{extract_items, ExtractRule};
pub use listing::{list_requester_tickets, paginate_locally};
pub use models::*;
pub use notes::submit_note;
pub use payload::TicketDefaults;
pub use resolve::{resolve_request_id, status_by_display};

use std::time::Instant;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use url::Url;

use crate::config::{ServiceConfig, ServiceDeskConfig};
use crate::core::{ClientBuilder, Transport};
use crate::error::{Result, ServiceError};
use crate::services::common::parse_error_response;
use crate::util::{sanitize_for_logging, truncate_string};

const SERVICE_NAME: &str = "servicedesk";

/// HTTP transport for a ServiceDesk Plus instance
pub struct ServiceDeskClient {
    /// HTTP client with auth headers installed
    http_client: Client,

    /// Configuration
    config: ServiceDeskConfig,
}

impl ServiceDeskClient {
    /// Create a client from validated configuration
    pub fn new(config: ServiceDeskConfig) -> Result<Self> {
        config.validate()?;
        Url::parse(&config.base_url)
            .map_err(|e| ServiceError::configuration(format!("Invalid SDP_URL: {}", e)))?;

        let http_client = ClientBuilder::from_config(&config).build_http_client()?;

        Ok(Self { http_client, config })
    }

    /// Create a client with configuration from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(ServiceDeskConfig::from_env()?)
    }

    /// Configuration the client was built with
    pub fn config(&self) -> &ServiceDeskConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url, endpoint.trim_start_matches('/'))
    }

    async fn send(&self, method: &str, endpoint: &str, builder: RequestBuilder) -> Result<Value> {
        debug!("Sending request to ServiceDesk: {} {}", method, endpoint);
        let start_time = Instant::now();

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let err = parse_error_response(SERVICE_NAME, endpoint, response).await;
            warn!(
                "ServiceDesk {} {} failed after {:?}: {}",
                method,
                endpoint,
                start_time.elapsed(),
                truncate_string(&sanitize_for_logging(&err.to_string()), 300)
            );
            return Err(err);
        }

        let body = response.text().await?;
        debug!(
            "ServiceDesk {} {} -> {} in {:?}",
            method,
            endpoint,
            status.as_u16(),
            start_time.elapsed()
        );

        if body.trim().is_empty() {
            return Ok(json!({}));
        }

        serde_json::from_str(&body).map_err(|e| {
            ServiceError::parsing(format!(
                "Failed to parse response from {}: {} ({})",
                endpoint,
                e,
                truncate_string(&body, 200)
            ))
        })
    }
}

#[async_trait]
impl Transport for ServiceDeskClient {
    async fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        let builder = self.http_client.get(self.url(endpoint)).query(query);
        self.send("GET", endpoint, builder).await
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let builder = self.http_client.post(self.url(endpoint)).json(body);
        self.send("POST", endpoint, builder).await
    }

    async fn post_form(&self, endpoint: &str, fields: &[(String, String)]) -> Result<Value> {
        let builder = self.http_client.post(self.url(endpoint)).form(fields);
        self.send("POST", endpoint, builder).await
    }

    async fn post_multipart(&self, endpoint: &str, fields: &[(String, String)]) -> Result<Value> {
        let form = fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()));
        let builder = self.http_client.post(self.url(endpoint)).multipart(form);
        self.send("POST", endpoint, builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ServiceDeskConfig {
        ServiceDeskConfig {
            base_url: base_url.to_string(),
            api_key: "tech-key".to_string(),
            ..ServiceDeskConfig::default()
        }
    }

    #[test]
    fn test_url_joins_endpoint() {
        let client = ServiceDeskClient::new(config("https://sdp.example.com")).unwrap();
        assert_eq!(
            client.url("/api/v3/requests"),
            "https://sdp.example.com/api/v3/requests"
        );
        assert_eq!(
            client.url("api/v3/sites"),
            "https://sdp.example.com/api/v3/sites"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = ServiceDeskClient::new(config("not a url")).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rejects_missing_key() {
        let mut cfg = config("https://sdp.example.com");
        cfg.api_key = String::new();
        assert!(ServiceDeskClient::new(cfg).is_err());
    }
}
