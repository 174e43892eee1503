//! # Charge Intent Types
//!
//! A charge intent is the processor's representation of an authorized but
//! not-yet-confirmed charge. The gateway provisions one intent per split
//! attempt (and one for each single payment), then confirms it with an
//! instrument proof supplied by the caller.

use crate::money::Currency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Processor-side status of a charge intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Intent created, awaiting confirmation
    Pending,
    /// Confirmation in flight
    Processing,
    /// Processor needs an additional customer step (e.g. bank redirect)
    RequiresAction,
    /// Charge captured
    Succeeded,
    /// Charge declined or confirmation failed
    Failed,
    /// Intent canceled at the processor
    Canceled,
}

impl IntentStatus {
    /// Whether the processor will accept no further confirmations
    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Succeeded | IntentStatus::Canceled)
    }
}

/// A charge intent provisioned at the remote processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeIntent {
    /// Processor-assigned identifier, used for confirm/refund/cancel calls
    pub remote_id: String,

    /// Client authorization token bound to this intent
    pub client_auth_token: String,

    /// Current status
    pub status: IntentStatus,

    /// Amount in smallest currency unit
    pub amount: i64,

    /// Currency
    pub currency: Currency,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Metadata attached at provisioning time
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A standalone single-payment intent (the degenerate one-attempt case;
/// not part of any split session)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleIntent {
    /// Processor-assigned identifier
    pub remote_id: String,

    /// Client authorization token
    pub client_auth_token: String,

    /// The logical order this payment belongs to
    pub order_id: String,

    /// Current status
    pub status: IntentStatus,

    /// Amount in smallest currency unit
    pub amount: i64,

    /// Currency
    pub currency: Currency,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Metadata attached at provisioning time
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl SingleIntent {
    /// Build a single intent from a provisioned charge intent
    pub fn from_charge_intent(intent: ChargeIntent, order_id: impl Into<String>) -> Self {
        Self {
            remote_id: intent.remote_id,
            client_auth_token: intent.client_auth_token,
            order_id: order_id.into(),
            status: intent.status,
            amount: intent.amount,
            currency: intent.currency,
            created_at: intent.created_at,
            metadata: intent.metadata,
        }
    }
}

/// Opaque caller-supplied authorization artifact used to confirm a charge.
///
/// The gateway never inspects the payment method itself; it forwards the
/// proof to the processor bound to the attempt's `remote_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentProof {
    /// Processor payment-method identifier or token
    pub payment_method: String,

    /// Return URL for redirect-based methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

impl InstrumentProof {
    pub fn new(payment_method: impl Into<String>) -> Self {
        Self {
            payment_method: payment_method.into(),
            return_url: None,
        }
    }

    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }
}

/// Result of confirming a charge at the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Failed,
    RequiresAction,
}

/// Structured outcome of a confirm call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeOutcome {
    /// Final disposition of the confirmation
    pub status: ChargeStatus,

    /// Human-readable message (decline reason, action hint)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChargeOutcome {
    pub fn succeeded() -> Self {
        Self {
            status: ChargeStatus::Succeeded,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ChargeStatus::Failed,
            message: Some(message.into()),
        }
    }

    pub fn requires_action(message: impl Into<String>) -> Self {
        Self {
            status: ChargeStatus::RequiresAction,
            message: Some(message.into()),
        }
    }
}

/// Refund status reported by the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

/// A refund issued against a charge intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    /// Processor-assigned refund identifier
    pub refund_id: String,

    /// Refund status
    pub status: RefundStatus,

    /// Refunded amount in smallest currency unit
    pub amount: i64,

    /// Currency
    pub currency: Currency,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Reason category attached to a refund request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    RequestedByCustomer,
    Other,
}

impl RefundReason {
    /// Processor wire value; `Other` carries its detail in metadata instead
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            RefundReason::Duplicate => Some("duplicate"),
            RefundReason::Fraudulent => Some("fraudulent"),
            RefundReason::RequestedByCustomer => Some("requested_by_customer"),
            RefundReason::Other => None,
        }
    }
}

/// Caller-facing outcome of a payment operation, carried by events and
/// returned from confirm calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    /// Whether the operation succeeded
    pub success: bool,

    /// Intent or session identifier the outcome refers to
    pub payment_id: String,

    /// Status after the operation
    pub status: IntentStatus,

    /// Error or decline message, when not successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentOutcome {
    pub fn success(payment_id: impl Into<String>, status: IntentStatus) -> Self {
        Self {
            success: true,
            payment_id: payment_id.into(),
            status,
            error: None,
        }
    }

    pub fn failure(
        payment_id: impl Into<String>,
        status: IntentStatus,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            payment_id: payment_id.into(),
            status,
            error: Some(error.into()),
        }
    }
}
