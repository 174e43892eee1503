//! # vsplit-gateway
//!
//! The split-payment session engine for vsplit.
//!
//! This crate provides:
//! - `SplitGateway` - session lifecycle: creation, per-attempt tracking,
//!   completion detection, timeout-driven compensating refunds
//! - the single-payment orchestrator (the degenerate one-attempt case)
//! - `GatewayConfig` for runtime configuration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vsplit_core::{EventKind, InstrumentProof, SplitSpec};
//! use vsplit_gateway::{GatewayConfig, SplitGateway, SplitSessionConfig};
//! use vsplit_stripe::StripeIntentsClient;
//!
//! let provider = Arc::new(StripeIntentsClient::from_env()?);
//! let gateway = SplitGateway::new(provider, GatewayConfig::load()?);
//!
//! gateway.on(EventKind::SplitCompleted, |event| {
//!     // order fully paid
//! });
//!
//! // $100.00 collected from two cards, 10 minute window
//! let session = gateway
//!     .create_split_session(SplitSessionConfig::new(vec![
//!         SplitSpec::new(6000).with_label("Card 1"),
//!         SplitSpec::new(4000).with_label("Card 2"),
//!     ]))
//!     .await?;
//!
//! gateway
//!     .attempt(&session.session_id, 0, &InstrumentProof::new("pm_..."))
//!     .await?;
//! ```

pub mod config;
pub mod engine;
pub mod single;

mod store;

// Re-exports for convenience
pub use config::GatewayConfig;
pub use engine::{AttemptResult, SplitGateway, SplitSessionConfig};
pub use single::{PaymentConfig, VerificationOutcome, VerificationRequest};
