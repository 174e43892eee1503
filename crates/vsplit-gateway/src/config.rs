//! # Gateway Configuration
//!
//! Runtime configuration for the split-payment engine. Loaded from
//! `config/vsplit.toml` when present, with environment variable overrides.

use serde::Deserialize;
use std::time::Duration;
use vsplit_core::{Currency, PaymentError, PaymentResult};

fn default_timeout_secs() -> u64 {
    600
}

/// Engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Default split-session timeout in seconds (caller can override per session)
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Default currency when the caller does not specify one
    #[serde(default)]
    pub currency: Currency,
}

impl GatewayConfig {
    /// Load from `config/vsplit.toml` if present, otherwise from env vars.
    pub fn load() -> PaymentResult<Self> {
        let config_paths = [
            "config/vsplit.toml",
            "../config/vsplit.toml",
            "../../config/vsplit.toml",
        ];

        for path in config_paths {
            if let Ok(content) = std::fs::read_to_string(path) {
                let config: GatewayConfig = toml::from_str(&content).map_err(|e| {
                    PaymentError::Configuration(format!("Failed to parse {}: {}", path, e))
                })?;
                tracing::info!("Loaded gateway config from {}", path);
                return Ok(config);
            }
        }

        Ok(Self::from_env())
    }

    /// Load from environment variables, with defaults for anything unset.
    ///
    /// Recognized env vars:
    /// - `VSPLIT_DEFAULT_TIMEOUT_SECS`
    /// - `VSPLIT_CURRENCY`
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let default_timeout_secs = std::env::var("VSPLIT_DEFAULT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_timeout_secs);

        let currency = std::env::var("VSPLIT_CURRENCY")
            .ok()
            .and_then(|v| Currency::parse(&v))
            .unwrap_or_default();

        Self {
            default_timeout_secs,
            currency,
        }
    }

    /// The default timeout as a [`Duration`]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            currency: Currency::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.default_timeout_secs, 600);
        assert_eq!(config.currency, Currency::USD);
        assert_eq!(config.default_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_toml_parsing() {
        let config: GatewayConfig =
            toml::from_str("default_timeout_secs = 300\ncurrency = \"eur\"").unwrap();
        assert_eq!(config.default_timeout_secs, 300);
        assert_eq!(config.currency, Currency::EUR);
    }

    #[test]
    fn test_toml_partial_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.default_timeout_secs, 600);
        assert_eq!(config.currency, Currency::USD);
    }
}
