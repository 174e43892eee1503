//! # Single-Payment Orchestrator
//!
//! The degenerate one-instrument case: one charge intent, no session
//! wrapper, no timer, no refund sweep. A declined single payment simply
//! reports failure; any compensating action is the caller's responsibility.

use crate::engine::SplitGateway;
use std::collections::HashMap;
use tracing::{info, instrument};
use vsplit_core::{
    ChargeStatus, CreateIntentRequest, Currency, GatewayEvent, InstrumentProof, IntentStatus,
    PaymentError, PaymentOutcome, PaymentResult, Refund, RefundRequest, SingleIntent,
};

/// Configuration for a single payment
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Amount in smallest currency unit
    pub amount: i64,
    /// Currency; defaults to the gateway currency
    pub currency: Option<Currency>,
    /// Unique order/transaction id
    pub order_id: String,
    /// Metadata attached to the charge intent
    pub metadata: HashMap<String, String>,
}

impl PaymentConfig {
    pub fn new(amount: i64, order_id: impl Into<String>) -> Self {
        Self {
            amount,
            currency: None,
            order_id: order_id.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
}

/// Request to verify a payment against expectations
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Charge intent to verify
    pub remote_id: String,
    /// Expected amount, if any
    pub expected_amount: Option<i64>,
    /// Expected currency, if any
    pub expected_currency: Option<Currency>,
}

/// Result of a verification check
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// True when the charge succeeded and matched every expectation
    pub verified: bool,
    /// Processor-side status
    pub status: IntentStatus,
    /// Amount the intent was provisioned with
    pub amount: i64,
    /// Currency the intent was provisioned with
    pub currency: Currency,
}

impl SplitGateway {
    /// Initialize a single payment: provision one charge intent and
    /// register it for status and verification lookups.
    #[instrument(skip(self, config), fields(order_id = %config.order_id, amount = config.amount))]
    pub async fn initialize_payment(&self, config: PaymentConfig) -> PaymentResult<SingleIntent> {
        if config.amount <= 0 {
            return Err(PaymentError::InvalidRequest(
                "Invalid payment amount".to_string(),
            ));
        }
        if config.order_id.trim().is_empty() {
            return Err(PaymentError::InvalidRequest(
                "Invalid order ID".to_string(),
            ));
        }

        let currency = config.currency.unwrap_or(self.inner.config.currency);
        let mut metadata = config.metadata;
        metadata.insert("order_id".to_string(), config.order_id.clone());

        let req = CreateIntentRequest {
            amount: config.amount,
            currency,
            metadata,
        };

        match self.inner.provider.create_charge_intent(req).await {
            Ok(intent) => {
                let single = SingleIntent::from_charge_intent(intent, config.order_id);
                info!("Initialized payment {}", single.remote_id);
                self.inner
                    .singles
                    .insert(single.remote_id.clone(), single.clone());
                Ok(single)
            }
            Err(e) => {
                let outcome =
                    PaymentOutcome::failure("", IntentStatus::Failed, e.to_string());
                self.inner.bus.emit(&GatewayEvent::PaymentFailed(outcome));
                Err(e)
            }
        }
    }

    /// Confirm a single payment with the caller's instrument proof.
    ///
    /// Declines are returned as a failure outcome (and surfaced via
    /// `payment:failed`), not as an error; the caller may retry.
    #[instrument(skip(self, proof), fields(remote_id = %remote_id))]
    pub async fn confirm_payment(
        &self,
        remote_id: &str,
        proof: &InstrumentProof,
    ) -> PaymentResult<PaymentOutcome> {
        if !self.inner.singles.contains_key(remote_id) {
            return Err(PaymentError::IntentNotFound {
                remote_id: remote_id.to_string(),
            });
        }

        let confirm = self.inner.provider.confirm_charge(remote_id, proof).await;

        let (status, outcome) = match confirm {
            Ok(result) => match result.status {
                ChargeStatus::Succeeded => (
                    IntentStatus::Succeeded,
                    PaymentOutcome::success(remote_id, IntentStatus::Succeeded),
                ),
                ChargeStatus::RequiresAction => (
                    IntentStatus::RequiresAction,
                    PaymentOutcome {
                        success: false,
                        payment_id: remote_id.to_string(),
                        status: IntentStatus::RequiresAction,
                        error: result.message,
                    },
                ),
                ChargeStatus::Failed => {
                    let message = result
                        .message
                        .unwrap_or_else(|| "Payment failed".to_string());
                    (
                        IntentStatus::Failed,
                        PaymentOutcome::failure(remote_id, IntentStatus::Failed, message),
                    )
                }
            },
            Err(e) => (
                IntentStatus::Failed,
                PaymentOutcome::failure(remote_id, IntentStatus::Failed, e.to_string()),
            ),
        };

        if let Some(mut single) = self.inner.singles.get_mut(remote_id) {
            single.status = status;
        }

        let event = match status {
            IntentStatus::Succeeded => GatewayEvent::PaymentSuccess(outcome.clone()),
            IntentStatus::RequiresAction => GatewayEvent::PaymentRequiresAction(outcome.clone()),
            _ => GatewayEvent::PaymentFailed(outcome.clone()),
        };
        self.inner.bus.emit(&event);

        Ok(outcome)
    }

    /// Cancel a single payment's charge intent
    #[instrument(skip(self), fields(remote_id = %remote_id))]
    pub async fn cancel_payment(&self, remote_id: &str) -> PaymentResult<PaymentOutcome> {
        if !self.inner.singles.contains_key(remote_id) {
            return Err(PaymentError::IntentNotFound {
                remote_id: remote_id.to_string(),
            });
        }

        if let Err(e) = self.inner.provider.cancel_charge_intent(remote_id).await {
            self.inner
                .bus
                .emit(&GatewayEvent::Error(e.to_string()));
            return Err(e);
        }

        self.inner.singles.remove(remote_id);

        let outcome = PaymentOutcome::success(remote_id, IntentStatus::Canceled);
        self.inner
            .bus
            .emit(&GatewayEvent::PaymentCanceled(outcome.clone()));
        Ok(outcome)
    }

    /// Processor-side status of a charge intent
    pub async fn payment_status(&self, remote_id: &str) -> PaymentResult<IntentStatus> {
        match self.inner.provider.get_status(remote_id).await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.inner.bus.emit(&GatewayEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Verify a payment: succeeded at the processor and matching the
    /// amount/currency the intent was provisioned with.
    pub async fn verify_payment(
        &self,
        req: VerificationRequest,
    ) -> PaymentResult<VerificationOutcome> {
        let single = self
            .inner
            .singles
            .get(&req.remote_id)
            .map(|s| s.clone())
            .ok_or_else(|| PaymentError::IntentNotFound {
                remote_id: req.remote_id.clone(),
            })?;

        let status = self.inner.provider.get_status(&req.remote_id).await?;

        let verified = status == IntentStatus::Succeeded
            && req.expected_amount.map_or(true, |a| a == single.amount)
            && req.expected_currency.map_or(true, |c| c == single.currency);

        Ok(VerificationOutcome {
            verified,
            status,
            amount: single.amount,
            currency: single.currency,
        })
    }

    /// Refund a payment directly (outside any session sweep)
    pub async fn refund_payment(&self, req: RefundRequest) -> PaymentResult<Refund> {
        match self.inner.provider.refund(req).await {
            Ok(refund) => Ok(refund),
            Err(e) => {
                self.inner.bus.emit(&GatewayEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }
}
