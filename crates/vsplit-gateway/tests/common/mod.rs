//! Shared test fixtures: a programmable in-memory payment provider and an
//! event capture helper.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use vsplit_core::{
    ChargeIntent, ChargeOutcome, CreateIntentRequest, EventKind, GatewayEvent, InstrumentProof,
    IntentStatus, PaymentError, PaymentProvider, PaymentResult, Refund, RefundRequest,
    RefundStatus,
};
use vsplit_gateway::SplitGateway;

/// In-memory provider. Confirmation behavior is selected by the payment
/// method in the instrument proof:
///
/// - `pm_ok` succeeds
/// - `pm_declined` fails with a card decline
/// - `pm_3ds` requires additional action
/// - `pm_network_error` fails with a transport error
#[derive(Default)]
pub struct MockProvider {
    counter: AtomicUsize,
    pub creates: Mutex<Vec<CreateIntentRequest>>,
    pub refunds: Mutex<Vec<RefundRequest>>,
    pub cancels: Mutex<Vec<String>>,
    statuses: Mutex<HashMap<String, IntentStatus>>,
    failing_create_splits: Mutex<HashSet<String>>,
    fail_every_create: AtomicBool,
    failing_refunds: Mutex<HashSet<String>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make provisioning fail for the split at `index`
    pub fn fail_create_for_split(&self, index: usize) {
        self.failing_create_splits
            .lock()
            .insert(index.to_string());
    }

    /// Make every intent creation fail
    pub fn fail_creates(&self) {
        self.fail_every_create.store(true, Ordering::SeqCst);
    }

    /// Make refunds of `remote_id` fail
    pub fn fail_refund_for(&self, remote_id: &str) {
        self.failing_refunds.lock().insert(remote_id.to_string());
    }

    pub fn refunded_ids(&self) -> Vec<String> {
        self.refunds
            .lock()
            .iter()
            .map(|r| r.remote_id.clone())
            .collect()
    }

    pub fn canceled_ids(&self) -> Vec<String> {
        self.cancels.lock().clone()
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().len()
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_charge_intent(&self, req: CreateIntentRequest) -> PaymentResult<ChargeIntent> {
        if self.fail_every_create.load(Ordering::SeqCst) {
            return Err(PaymentError::ProviderError {
                provider: "mock".to_string(),
                message: "intent creation rejected".to_string(),
            });
        }
        if let Some(index) = req.metadata.get("split_index") {
            if self.failing_create_splits.lock().contains(index) {
                return Err(PaymentError::ProviderError {
                    provider: "mock".to_string(),
                    message: format!("intent creation rejected for split {}", index),
                });
            }
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let remote_id = format!("pi_mock_{}", n);
        self.statuses
            .lock()
            .insert(remote_id.clone(), IntentStatus::Pending);
        self.creates.lock().push(req.clone());

        Ok(ChargeIntent {
            remote_id: remote_id.clone(),
            client_auth_token: format!("{}_secret", remote_id),
            status: IntentStatus::Pending,
            amount: req.amount,
            currency: req.currency,
            created_at: Utc::now(),
            metadata: req.metadata,
        })
    }

    async fn confirm_charge(
        &self,
        remote_id: &str,
        proof: &InstrumentProof,
    ) -> PaymentResult<ChargeOutcome> {
        match proof.payment_method.as_str() {
            "pm_ok" => {
                self.statuses
                    .lock()
                    .insert(remote_id.to_string(), IntentStatus::Succeeded);
                Ok(ChargeOutcome::succeeded())
            }
            "pm_declined" => {
                self.statuses
                    .lock()
                    .insert(remote_id.to_string(), IntentStatus::Failed);
                Ok(ChargeOutcome::failed("Your card was declined."))
            }
            "pm_3ds" => Ok(ChargeOutcome::requires_action("Authentication required")),
            "pm_network_error" => Err(PaymentError::NetworkError("connection reset".to_string())),
            other => Ok(ChargeOutcome::failed(format!(
                "Unknown payment method: {}",
                other
            ))),
        }
    }

    async fn refund(&self, req: RefundRequest) -> PaymentResult<Refund> {
        if self.failing_refunds.lock().contains(&req.remote_id) {
            return Err(PaymentError::ProviderError {
                provider: "mock".to_string(),
                message: format!("refund of {} rejected", req.remote_id),
            });
        }
        let mut refunds = self.refunds.lock();
        refunds.push(req.clone());
        Ok(Refund {
            refund_id: format!("re_mock_{}", refunds.len()),
            status: RefundStatus::Succeeded,
            amount: req.amount.unwrap_or(0),
            currency: vsplit_core::Currency::USD,
            created_at: Utc::now(),
        })
    }

    async fn cancel_charge_intent(&self, remote_id: &str) -> PaymentResult<IntentStatus> {
        self.cancels.lock().push(remote_id.to_string());
        self.statuses
            .lock()
            .insert(remote_id.to_string(), IntentStatus::Canceled);
        Ok(IntentStatus::Canceled)
    }

    async fn get_status(&self, remote_id: &str) -> PaymentResult<IntentStatus> {
        self.statuses
            .lock()
            .get(remote_id)
            .copied()
            .ok_or_else(|| PaymentError::IntentNotFound {
                remote_id: remote_id.to_string(),
            })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Subscribe to every event kind, collecting emissions in order
pub fn capture_events(gateway: &SplitGateway) -> Arc<Mutex<Vec<GatewayEvent>>> {
    let log: Arc<Mutex<Vec<GatewayEvent>>> = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::PaymentSuccess,
        EventKind::PaymentFailed,
        EventKind::PaymentRequiresAction,
        EventKind::PaymentCanceled,
        EventKind::SplitCompleted,
        EventKind::SplitPartial,
        EventKind::SplitTimeout,
        EventKind::Error,
    ] {
        let log = Arc::clone(&log);
        gateway.on(kind, move |event| log.lock().push(event.clone()));
    }
    log
}

/// Count captured events of one kind
pub fn count_kind(log: &Mutex<Vec<GatewayEvent>>, kind: EventKind) -> usize {
    log.lock().iter().filter(|e| e.kind() == kind).count()
}
