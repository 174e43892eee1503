//! # vsplit-core
//!
//! Core types and primitives for the vsplit payment gateway.
//!
//! This crate provides:
//! - `PaymentProvider` trait for the remote processor boundary
//! - `SplitSession` and `SplitAttempt` for the split-payment session model
//! - `SingleIntent` for the single-payment path
//! - `EventBus` for typed gateway events
//! - `PaymentTimer` for session timeout scheduling
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use vsplit_core::{SplitSession, SplitSpec, Currency, EventBus, EventKind};
//!
//! // Validate a split configuration before provisioning
//! let splits = vec![SplitSpec::new(6000), SplitSpec::new(4000)];
//! let total = SplitSession::validate_splits(&splits, None)?;
//!
//! // Subscribe to completion events
//! let bus = EventBus::new();
//! bus.on(EventKind::SplitCompleted, |event| {
//!     // notify the caller
//! });
//! ```

pub mod error;
pub mod events;
pub mod intent;
pub mod money;
pub mod provider;
pub mod session;
pub mod timer;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult};
pub use events::{EventBus, EventKind, GatewayEvent, ListenerId};
pub use intent::{
    ChargeIntent, ChargeOutcome, ChargeStatus, InstrumentProof, IntentStatus, PaymentOutcome,
    Refund, RefundReason, RefundStatus, SingleIntent,
};
pub use money::Currency;
pub use provider::{
    BoxedPaymentProvider, CreateIntentRequest, PaymentProvider, RefundRequest, RemoteChargeEvent,
    RemoteEventKind,
};
pub use session::{
    AttemptStatus, SessionStatus, SplitAttempt, SplitSession, SplitSpec, MAX_SPLITS, MIN_SPLITS,
};
pub use timer::PaymentTimer;
