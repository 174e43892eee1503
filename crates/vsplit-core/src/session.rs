//! # Split Session Types
//!
//! The split-payment session aggregate: one logical order collected through
//! multiple independent charge attempts, each identified by its index.
//!
//! Mutation is owned exclusively by the session engine; everything handed to
//! callers and event listeners is a cloned snapshot.

use crate::error::{PaymentError, PaymentResult};
use crate::intent::ChargeIntent;
use crate::money::Currency;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum number of contributors per split session
pub const MIN_SPLITS: usize = 2;

/// Maximum number of contributors per split session
pub const MAX_SPLITS: usize = 10;

/// One requested split: an amount and an optional display label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSpec {
    /// Amount in smallest currency unit, must be positive
    pub amount: i64,

    /// Optional label for this contributor ("Card 1", "Alice", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SplitSpec {
    pub fn new(amount: i64) -> Self {
        Self {
            amount,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Status of a single attempt within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Provisioned, not yet confirmed
    Pending,
    /// Confirmation in flight
    Processing,
    /// Charge captured
    Succeeded,
    /// Declined or errored; retry is allowed
    Failed,
}

/// Overall session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No attempt has succeeded yet
    Pending,
    /// At least one attempt succeeded, not all
    Partial,
    /// Every attempt succeeded
    Succeeded,
    /// Timed out or explicitly canceled; successful attempts were refunded
    Canceled,
    /// Provisioning failed; no usable session
    Failed,
}

impl SessionStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Succeeded | SessionStatus::Canceled | SessionStatus::Failed
        )
    }
}

/// One instrument's charge within a split session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitAttempt {
    /// 0-based position, the stable identity used by callers
    pub index: usize,

    /// Amount in smallest currency unit
    pub amount: i64,

    /// Optional contributor label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Processor charge-intent identifier, used for refund/cancel calls
    pub remote_id: String,

    /// Client authorization token for this attempt
    pub client_auth_token: String,

    /// Current status
    pub status: AttemptStatus,
}

/// A split-payment session: the aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSession {
    /// Opaque unique identifier, generated at creation
    pub session_id: String,

    /// The logical order being collected
    pub order_id: String,

    /// Currency shared by all attempts
    pub currency: Currency,

    /// Total amount; always equals the sum of attempt amounts
    pub total_amount: i64,

    /// Ordered attempts; length fixed at creation, index is identity
    pub attempts: Vec<SplitAttempt>,

    /// Overall status
    pub status: SessionStatus,

    /// Count of attempts with status `Succeeded`
    pub completed_count: u32,

    /// Count of recorded attempt failures
    pub failed_count: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// `created_at + timeout`
    pub expires_at: DateTime<Utc>,
}

impl SplitSession {
    /// Validate a split configuration and return the implied total amount.
    ///
    /// Rejected synchronously, before any remote call:
    /// - fewer than [`MIN_SPLITS`] or more than [`MAX_SPLITS`] contributors
    /// - any non-positive amount
    /// - an `expected_total` that does not equal the sum of the splits
    pub fn validate_splits(
        splits: &[SplitSpec],
        expected_total: Option<i64>,
    ) -> PaymentResult<i64> {
        if splits.len() < MIN_SPLITS {
            return Err(PaymentError::InvalidSplit {
                message: format!("At least {} split payments are required", MIN_SPLITS),
            });
        }
        if splits.len() > MAX_SPLITS {
            return Err(PaymentError::InvalidSplit {
                message: format!("Maximum {} split payments allowed", MAX_SPLITS),
            });
        }
        for (i, split) in splits.iter().enumerate() {
            if split.amount <= 0 {
                return Err(PaymentError::InvalidSplit {
                    message: format!("Invalid amount for split {}", i + 1),
                });
            }
        }

        let total: i64 = splits.iter().map(|s| s.amount).sum();
        if let Some(expected) = expected_total {
            if expected != total {
                return Err(PaymentError::InvalidSplit {
                    message: "Split amounts must equal total amount".to_string(),
                });
            }
        }
        Ok(total)
    }

    /// Assemble a session from provisioned charge intents, one per split,
    /// in input order. The caller must have validated the splits first.
    pub fn from_provisioned(
        order_id: impl Into<String>,
        currency: Currency,
        provisioned: Vec<(SplitSpec, ChargeIntent)>,
        timeout: std::time::Duration,
    ) -> Self {
        let total_amount: i64 = provisioned.iter().map(|(spec, _)| spec.amount).sum();
        let attempts: Vec<SplitAttempt> = provisioned
            .into_iter()
            .enumerate()
            .map(|(index, (spec, intent))| SplitAttempt {
                index,
                amount: spec.amount,
                label: spec.label,
                remote_id: intent.remote_id,
                client_auth_token: intent.client_auth_token,
                status: AttemptStatus::Pending,
            })
            .collect();

        let created_at = Utc::now();
        let expires_at = created_at
            + Duration::from_std(timeout).unwrap_or_else(|_| Duration::seconds(600));

        Self {
            session_id: format!("split_{}", Uuid::new_v4()),
            order_id: order_id.into(),
            currency,
            total_amount,
            attempts,
            status: SessionStatus::Pending,
            completed_count: 0,
            failed_count: 0,
            created_at,
            expires_at,
        }
    }

    /// Whether the session has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether every attempt has succeeded
    pub fn is_complete(&self) -> bool {
        self.completed_count as usize == self.attempts.len()
    }

    /// Attempts still awaiting a successful confirmation
    pub fn remaining_count(&self) -> usize {
        self.attempts.len() - self.completed_count as usize
    }

    /// Look up an attempt by index
    pub fn attempt(&self, index: usize) -> Option<&SplitAttempt> {
        self.attempts.get(index)
    }
}
