//! # vsplit-stripe
//!
//! Stripe provider for the vsplit payment gateway.
//!
//! This crate implements the `PaymentProvider` contract from `vsplit-core`
//! over Stripe's PaymentIntents API:
//!
//! - **StripeIntentsClient** - charge-intent provisioning, confirmation,
//!   refunds, cancels, and status lookups
//! - **StripeWebhookVerifier** - signature verification and parsing of
//!   inbound charge events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vsplit_stripe::StripeIntentsClient;
//! use vsplit_core::{CreateIntentRequest, Currency, PaymentProvider};
//!
//! // Create provider from environment
//! let provider = StripeIntentsClient::from_env()?;
//!
//! // Provision a charge intent
//! let intent = provider
//!     .create_charge_intent(CreateIntentRequest {
//!         amount: 5000,
//!         currency: Currency::USD,
//!         metadata: Default::default(),
//!     })
//!     .await?;
//!
//! // Hand intent.client_auth_token to the paying customer
//! ```

pub mod client;
pub mod config;
pub mod webhook;

// Re-exports
pub use client::StripeIntentsClient;
pub use config::StripeConfig;
pub use webhook::{parse_charge_event, StripeWebhookVerifier};
