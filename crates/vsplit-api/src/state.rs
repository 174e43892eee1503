//! # Application State
//!
//! Shared state for the Axum application: the split gateway, the webhook
//! verifier, and server configuration.

use std::sync::Arc;
use vsplit_gateway::{GatewayConfig, SplitGateway};
use vsplit_stripe::{StripeConfig, StripeIntentsClient, StripeWebhookVerifier};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The split-payment gateway
    pub gateway: SplitGateway,
    /// Webhook signature verifier
    pub webhook_verifier: StripeWebhookVerifier,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState backed by the Stripe provider
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let stripe_config = StripeConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load Stripe config: {}", e))?;
        let webhook_verifier = StripeWebhookVerifier::new(stripe_config.webhook_secret.clone());
        let provider = Arc::new(StripeIntentsClient::new(stripe_config));

        let gateway_config = GatewayConfig::load()
            .map_err(|e| anyhow::anyhow!("Failed to load gateway config: {}", e))?;
        let gateway = SplitGateway::new(provider, gateway_config);

        Ok(Self {
            gateway,
            webhook_verifier,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        std::env::remove_var("HOST");
        std::env::remove_var("PORT");

        let config = AppConfig::from_env();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "test".to_string(),
        };

        let addr = config.socket_addr();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }
}
