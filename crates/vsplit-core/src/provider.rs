//! # Payment Provider Trait
//!
//! The Remote Payment Client boundary: a thin request/response contract
//! over the hosted processor's network API. The session engine is generic
//! over this trait; `vsplit-stripe` supplies the production implementation.
//!
//! Every call is a network round trip and may suspend. Failures are always
//! reported as structured errors, never panics.

use crate::error::PaymentResult;
use crate::intent::{ChargeIntent, ChargeOutcome, InstrumentProof, IntentStatus, Refund, RefundReason};
use crate::money::Currency;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Request to provision a charge intent
#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    /// Amount in smallest currency unit
    pub amount: i64,
    /// Currency
    pub currency: Currency,
    /// Metadata attached to the intent at the processor
    pub metadata: HashMap<String, String>,
}

/// Request to refund a captured charge
#[derive(Debug, Clone)]
pub struct RefundRequest {
    /// The charge intent to refund
    pub remote_id: String,
    /// Amount to refund; `None` refunds the full amount
    pub amount: Option<i64>,
    /// Reason category
    pub reason: RefundReason,
    /// Metadata attached to the refund at the processor
    pub metadata: HashMap<String, String>,
}

impl RefundRequest {
    pub fn full(remote_id: impl Into<String>, reason: RefundReason) -> Self {
        Self {
            remote_id: remote_id.into(),
            amount: None,
            reason,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Core trait for the remote payment processor.
///
/// Implementations wrap one hosted processor's API. The engine treats the
/// processor as reliable-but-fallible: calls return structured success or
/// failure, and refund/cancel failures are reported, never thrown uncaught.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provision a charge intent for one attempt.
    async fn create_charge_intent(&self, req: CreateIntentRequest) -> PaymentResult<ChargeIntent>;

    /// Confirm a charge with a caller-supplied instrument proof.
    ///
    /// Declines surface as `Err` with a human-readable reason; the engine
    /// records them against the attempt without terminating the session.
    async fn confirm_charge(
        &self,
        remote_id: &str,
        proof: &InstrumentProof,
    ) -> PaymentResult<ChargeOutcome>;

    /// Refund a captured charge, fully or partially.
    async fn refund(&self, req: RefundRequest) -> PaymentResult<Refund>;

    /// Cancel an unconfirmed charge intent.
    async fn cancel_charge_intent(&self, remote_id: &str) -> PaymentResult<IntentStatus>;

    /// Fetch the processor-side status of a charge intent.
    async fn get_status(&self, remote_id: &str) -> PaymentResult<IntentStatus>;

    /// Provider name (for logging and metadata).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared provider (dynamic dispatch)
pub type BoxedPaymentProvider = Arc<dyn PaymentProvider>;

/// Kind of an inbound processor event referencing a charge intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteEventKind {
    ChargeSucceeded,
    ChargeFailed,
    ChargeCanceled,
    Unknown(String),
}

/// A verified inbound processor event (webhook), normalized to the fields
/// the engine needs to settle the referenced attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChargeEvent {
    /// Processor event identifier
    pub event_id: String,
    /// The charge intent the event refers to
    pub remote_id: String,
    /// What happened
    pub kind: RemoteEventKind,
    /// Decline or failure message, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Processor-side timestamp
    pub created_at: DateTime<Utc>,
}
