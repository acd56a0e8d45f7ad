//! Configuration management for the ServiceDesk Plus client
//!
//! This module provides utilities for loading and validating configuration,
//! with support for environment variables. Values are read once and treated
//! as constant for the life of the process.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, ServiceError};

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" | "" => Ok(false),
            _ => Err(ServiceError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a non-empty string value, treating blank values as unset
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer configuration value with a default
    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Get a boolean configuration value with a default
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "SDP", "TRACE")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Global default configuration provider (plain environment variables)
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> = Lazy::new(|| Arc::new(EnvConfigProvider::new()));

/// Trait for service-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Service name
    fn service_name(&self) -> &str;
}

/// Reference to an upstream entity (site, request template) by id or by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    /// Internal identifier; numeric when the configured value parses as one
    Id(Value),
    /// Display name
    Name(String),
}

impl EntityRef {
    /// Resolve the id-then-name precedence. Blank values count as unset.
    pub fn from_parts(id: Option<String>, name: Option<String>) -> Option<Self> {
        let id = id.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let name = name.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(id) = id {
            let value = match id.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(id),
            };
            return Some(EntityRef::Id(value));
        }

        name.map(EntityRef::Name)
    }

    /// Payload clause: `{"id": ...}` or `{"name": ...}`
    pub fn to_clause(&self) -> Value {
        match self {
            EntityRef::Id(id) => json!({ "id": id }),
            EntityRef::Name(name) => json!({ "name": name }),
        }
    }
}

/// Connection and creation defaults for ServiceDesk Plus
#[derive(Debug, Clone)]
pub struct ServiceDeskConfig {
    /// Base URL, without trailing slash
    pub base_url: String,

    /// Technician auth token
    pub api_key: String,

    /// Timeout applied to every upstream request, in seconds
    pub timeout_seconds: u64,

    /// Site injected into new tickets
    pub default_site: Option<EntityRef>,

    /// Request template injected into new tickets
    pub default_template: Option<EntityRef>,

    /// Retry ticket creation without a template when the template is rejected
    pub allow_template_fallback: bool,
}

impl Default for ServiceDeskConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_seconds: 20,
            default_site: None,
            default_template: None,
            allow_template_fallback: true,
        }
    }
}

impl ServiceDeskConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let base_url = provider
            .get_string("sdp_url")?
            .trim()
            .trim_end_matches('/')
            .to_string();
        let api_key = provider.get_string("sdp_api_key")?;
        let timeout_seconds = provider.get_int_or("sdp_timeout_seconds", 20).max(1) as u64;

        let default_site = EntityRef::from_parts(
            provider.get_non_empty("sdp_default_site_id"),
            provider.get_non_empty("sdp_default_site_name"),
        );
        let default_template = EntityRef::from_parts(
            provider.get_non_empty("sdp_template_id"),
            provider.get_non_empty("sdp_template_name"),
        );
        // Unset means on; any set value other than an explicit yes means off
        let allow_template_fallback = provider
            .get_string("allow_template_fallback")
            .map(|value| is_enabled(&value))
            .unwrap_or(true);

        let config = Self {
            base_url,
            api_key,
            timeout_seconds,
            default_site,
            default_template,
            allow_template_fallback,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_provider(&**DEFAULT_PROVIDER)
    }
}

fn is_enabled(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl ServiceConfig for ServiceDeskConfig {
    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ServiceError::configuration("SDP_URL is required"));
        }

        if self.api_key.trim().is_empty() {
            return Err(ServiceError::configuration("SDP_API_KEY is required"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "servicedesk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_provider() -> MemoryConfigProvider {
        let mut provider = MemoryConfigProvider::new();
        provider.set("sdp_url", "https://sdp.example.com/");
        provider.set("sdp_api_key", "tech-key");
        provider
    }

    #[test]
    fn test_env_config_provider_key_format() {
        let provider = EnvConfigProvider::new()
            .with_prefix("TEST")
            .with_namespace("CONFIG");

        assert_eq!(provider.format_key("api_key"), "TEST_CONFIG_API_KEY");
        assert_eq!(provider.format_key("base-url"), "TEST_CONFIG_BASE_URL");
        assert_eq!(EnvConfigProvider::new().format_key("sdp_url"), "SDP_URL");
    }

    #[test]
    fn test_servicedesk_config_defaults() {
        let config = ServiceDeskConfig::from_provider(&base_provider()).unwrap();

        assert_eq!(config.base_url, "https://sdp.example.com");
        assert_eq!(config.timeout_seconds, 20);
        assert!(config.default_site.is_none());
        assert!(config.default_template.is_none());
        assert!(config.allow_template_fallback);
    }

    #[test]
    fn test_servicedesk_config_requires_url_and_key() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("sdp_url", "https://sdp.example.com");
        assert!(ServiceDeskConfig::from_provider(&provider).is_err());

        provider.set("sdp_api_key", "   ");
        let err = ServiceDeskConfig::from_provider(&provider).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_entity_ref_precedence_and_coercion() {
        assert_eq!(
            EntityRef::from_parts(Some(" 12 ".into()), Some("HQ".into())),
            Some(EntityRef::Id(Value::from(12)))
        );
        assert_eq!(
            EntityRef::from_parts(Some("site-a".into()), None),
            Some(EntityRef::Id(Value::String("site-a".into())))
        );
        assert_eq!(
            EntityRef::from_parts(Some("".into()), Some("HQ".into())),
            Some(EntityRef::Name("HQ".into()))
        );
        assert_eq!(EntityRef::from_parts(None, Some("  ".into())), None);

        assert_eq!(EntityRef::Id(Value::from(7)).to_clause(), json!({"id": 7}));
        assert_eq!(EntityRef::Name("HQ".into()).to_clause(), json!({"name": "HQ"}));
    }

    #[test]
    fn test_template_fallback_toggle() {
        let mut provider = base_provider();
        provider.set("allow_template_fallback", "no");
        provider.set("sdp_template_name", "Incident");
        provider.set("sdp_timeout_seconds", "5");

        let config = ServiceDeskConfig::from_provider(&provider).unwrap();
        assert!(!config.allow_template_fallback);
        assert_eq!(config.default_template, Some(EntityRef::Name("Incident".into())));
        assert_eq!(config.timeout_seconds, 5);
    }

    #[test]
    fn test_unrecognised_fallback_value_disables_retry() {
        for value in ["disabled", "off", "", "maybe"] {
            let mut provider = base_provider();
            provider.set("allow_template_fallback", value);

            let config = ServiceDeskConfig::from_provider(&provider).unwrap();
            assert!(!config.allow_template_fallback, "value {:?}", value);
        }

        let mut provider = base_provider();
        provider.set("allow_template_fallback", " YES ");
        assert!(ServiceDeskConfig::from_provider(&provider).unwrap().allow_template_fallback);

        let config = ServiceDeskConfig::from_provider(&base_provider()).unwrap();
        assert!(config.allow_template_fallback);
    }
}
