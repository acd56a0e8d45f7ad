//! Bridge settings read once at startup

use std::path::PathBuf;

use ticket_sdk::config::{ConfigProvider, ConfigProviderExt, DEFAULT_PROVIDER};
use trace_ledger::TraceLedgerConfig;

const DEFAULT_ADDR: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Exposes `/meta/trace/recent` when set.
    pub dev_trace_enabled: bool,
    pub trace: TraceLedgerConfig,
}

impl BridgeConfig {
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        let bind_addr = provider
            .get_non_empty("BRIDGE_SERVICE_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let raw_port = provider.get_int_or("BRIDGE_SERVICE_PORT", i64::from(DEFAULT_PORT));
        let port = u16::try_from(raw_port).unwrap_or_else(|_| {
            tracing::warn!(
                "BRIDGE_SERVICE_PORT {} out of range, using {}",
                raw_port,
                DEFAULT_PORT
            );
            DEFAULT_PORT
        });

        Self {
            bind_addr,
            port,
            dev_trace_enabled: provider.get_bool_or("DEV_TRACE_ENABLED", false),
            trace: trace_config(provider),
        }
    }

    pub fn from_env() -> Self {
        Self::from_provider(&**DEFAULT_PROVIDER)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn trace_config<P: ConfigProvider + ?Sized>(provider: &P) -> TraceLedgerConfig {
    let defaults = TraceLedgerConfig::default();

    TraceLedgerConfig {
        path: provider
            .get_non_empty("TRACE_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.path),
        retention_days: provider.get_int_or("TRACE_RETENTION_DAYS", defaults.retention_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticket_sdk::config::MemoryConfigProvider;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_provider(&MemoryConfigProvider::new());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.dev_trace_enabled);
        assert_eq!(config.trace.retention_days, 180);
        assert_eq!(config.trace.path, PathBuf::from("data/trace/executions.jsonl"));
    }

    #[test]
    fn test_overrides_and_bad_port() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("BRIDGE_SERVICE_ADDR", "127.0.0.1");
        provider.set("BRIDGE_SERVICE_PORT", "70000");
        provider.set("DEV_TRACE_ENABLED", "yes");
        provider.set("TRACE_LOG_PATH", "/var/lib/bridge/trace.jsonl");
        provider.set("TRACE_RETENTION_DAYS", "30");

        let config = BridgeConfig::from_provider(&provider);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert!(config.dev_trace_enabled);
        assert_eq!(config.trace.path, PathBuf::from("/var/lib/bridge/trace.jsonl"));
        assert_eq!(config.trace.retention_days, 30);
    }
}
