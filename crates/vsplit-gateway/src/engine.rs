//! # Split-Payment Session Engine
//!
//! Owns the full lifecycle of a split session: provisioning one charge
//! intent per contributor, tracking per-attempt completion, detecting the
//! all-success case, and running the timeout-driven compensating-refund
//! sweep when the session cannot complete in time.
//!
//! ## Concurrency
//!
//! Sessions are independent units; the engine supports concurrent callers
//! across sessions with no shared mutable state between them. Within one
//! session, every status transition and the completion check happen under
//! that session's lock. The lock is never held across a remote call:
//! `attempt` marks the attempt in flight, confirms the charge unlocked,
//! then re-acquires the lock and re-checks the session before applying the
//! result. A charge that succeeds at the exact moment the timer fires is
//! therefore refunded exactly once — by the in-flight caller, never by the
//! sweep, which only refunds attempts it observed as succeeded.

use crate::config::GatewayConfig;
use crate::store::SessionStore;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vsplit_core::{
    AttemptStatus, BoxedPaymentProvider, ChargeIntent, ChargeStatus, CreateIntentRequest,
    Currency, EventBus, EventKind, GatewayEvent, InstrumentProof, IntentStatus, ListenerId,
    PaymentError, PaymentOutcome, PaymentResult, RefundReason, RefundRequest, RemoteChargeEvent,
    RemoteEventKind, SessionStatus, SingleIntent, SplitSession, SplitSpec,
};

/// Metadata value attached to refunds issued by the compensation sweep
const REFUND_REASON_TIMEOUT: &str = "split_payment_timeout";

/// Configuration for creating a split session
#[derive(Debug, Clone)]
pub struct SplitSessionConfig {
    /// One entry per contributor, in caller order
    pub splits: Vec<SplitSpec>,
    /// Logical order id; generated when absent
    pub order_id: Option<String>,
    /// Currency; defaults to the gateway currency
    pub currency: Option<Currency>,
    /// Expected total; must equal the sum of splits when provided
    pub total_amount: Option<i64>,
    /// Session timeout; defaults to the gateway default (600 s)
    pub timeout: Option<Duration>,
    /// Metadata propagated onto every provisioned charge intent
    pub metadata: HashMap<String, String>,
}

impl SplitSessionConfig {
    pub fn new(splits: Vec<SplitSpec>) -> Self {
        Self {
            splits,
            order_id: None,
            currency: None,
            total_amount: None,
            timeout: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_total_amount(mut self, total: i64) -> Self {
        self.total_amount = Some(total);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of driving one attempt
#[derive(Debug, Clone)]
pub struct AttemptResult {
    /// Outcome of the confirmation itself
    pub outcome: PaymentOutcome,
    /// Session snapshot taken after the attempt was applied
    pub session: SplitSession,
}

/// The split-payment gateway: session engine plus the single-payment path
#[derive(Clone)]
pub struct SplitGateway {
    pub(crate) inner: Arc<GatewayInner>,
}

pub(crate) struct GatewayInner {
    pub(crate) provider: BoxedPaymentProvider,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) config: GatewayConfig,
    pub(crate) store: SessionStore,
    pub(crate) singles: DashMap<String, SingleIntent>,
}

impl SplitGateway {
    pub fn new(provider: BoxedPaymentProvider, config: GatewayConfig) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                provider,
                bus: Arc::new(EventBus::new()),
                config,
                store: SessionStore::new(),
                singles: DashMap::new(),
            }),
        }
    }

    /// The gateway's event bus
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.inner.bus)
    }

    /// Subscribe to a gateway event
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on(kind, callback)
    }

    /// Unsubscribe from a gateway event
    pub fn off(&self, kind: EventKind, id: ListenerId) {
        self.inner.bus.off(kind, id)
    }

    /// Number of live (non-terminal) sessions
    pub fn active_sessions(&self) -> usize {
        self.inner.store.len()
    }

    /// Create a split session: validate, provision one charge intent per
    /// split (all-or-nothing), and arm the timeout timer.
    ///
    /// No event is emitted on creation; events fire only on transitions.
    #[instrument(skip(self, config), fields(splits = config.splits.len()))]
    pub async fn create_split_session(
        &self,
        config: SplitSessionConfig,
    ) -> PaymentResult<SplitSession> {
        SplitSession::validate_splits(&config.splits, config.total_amount)?;

        let currency = config.currency.unwrap_or(self.inner.config.currency);
        let order_id = config
            .order_id
            .clone()
            .unwrap_or_else(|| format!("order_{}", Uuid::new_v4()));
        let timeout = config.timeout.unwrap_or(self.inner.config.default_timeout());

        // Fan out provisioning; completion order is irrelevant, the
        // attempts sequence preserves input order by index.
        let mut join_set: JoinSet<(usize, PaymentResult<ChargeIntent>)> = JoinSet::new();
        for (index, spec) in config.splits.iter().enumerate() {
            let provider = Arc::clone(&self.inner.provider);
            let mut metadata = config.metadata.clone();
            metadata.insert("order_id".to_string(), order_id.clone());
            metadata.insert("split_index".to_string(), index.to_string());
            if let Some(ref label) = spec.label {
                metadata.insert("split_label".to_string(), label.clone());
            }
            let req = CreateIntentRequest {
                amount: spec.amount,
                currency,
                metadata,
            };
            join_set.spawn(async move { (index, provider.create_charge_intent(req).await) });
        }

        let mut provisioned: Vec<Option<ChargeIntent>> =
            (0..config.splits.len()).map(|_| None).collect();
        let mut first_error: Option<PaymentError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(intent))) => provisioned[index] = Some(intent),
                Ok((_, Err(e))) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error =
                            Some(PaymentError::Internal(format!("Provisioning task failed: {}", e)));
                    }
                }
            }
        }

        // All-or-nothing: on any failure, cancel whatever was created and
        // expose no session.
        if let Some(err) = first_error {
            let created: Vec<String> = provisioned
                .iter()
                .flatten()
                .map(|intent| intent.remote_id.clone())
                .collect();
            if !created.is_empty() {
                warn!(
                    "Provisioning failed for order {}; canceling {} already-created intents",
                    order_id,
                    created.len()
                );
                self.inner.cancel_intents_best_effort(&created).await;
            }
            return Err(PaymentError::ProvisioningFailed {
                message: err.to_string(),
            });
        }

        let mut intents = Vec::with_capacity(provisioned.len());
        for slot in provisioned {
            match slot {
                Some(intent) => intents.push(intent),
                None => {
                    return Err(PaymentError::Internal(
                        "Provisioning completed without an intent".to_string(),
                    ))
                }
            }
        }

        let session = SplitSession::from_provisioned(
            order_id,
            currency,
            config.splits.into_iter().zip(intents).collect(),
            timeout,
        );
        let snapshot = session.clone();
        let slot = self.inner.store.insert(session);

        let inner = Arc::clone(&self.inner);
        let session_id = snapshot.session_id.clone();
        slot.timer.arm(timeout, async move {
            inner.handle_timeout(&session_id).await;
        });

        info!(
            "Created split session {} for order {}: {} attempts, {} total, expires {}",
            snapshot.session_id,
            snapshot.order_id,
            snapshot.attempts.len(),
            snapshot.currency.display_amount(snapshot.total_amount),
            snapshot.expires_at
        );

        Ok(snapshot)
    }

    /// Drive one attempt: confirm the charge bound to `attempts[index]`
    /// with the caller's instrument proof.
    ///
    /// A declined attempt is recorded and surfaced via `payment:failed`
    /// without closing the session; the caller may retry until the timeout
    /// fires. Retrying an attempt that already succeeded is rejected with
    /// no side effects.
    #[instrument(skip(self, proof), fields(session_id = %session_id, index = index))]
    pub async fn attempt(
        &self,
        session_id: &str,
        index: usize,
        proof: &InstrumentProof,
    ) -> PaymentResult<AttemptResult> {
        let slot = self.inner.store.get(session_id).ok_or_else(|| {
            PaymentError::SessionNotFound {
                session_id: session_id.to_string(),
            }
        })?;

        // Phase 1: validate preconditions and mark the attempt in flight.
        let remote_id = {
            let mut state = slot.state.lock().await;
            if state.is_terminal() {
                return Err(PaymentError::SessionClosed {
                    session_id: session_id.to_string(),
                });
            }
            let attempt = state.attempt(index).ok_or_else(|| {
                PaymentError::InvalidAttempt {
                    session_id: session_id.to_string(),
                    index,
                }
            })?;
            match attempt.status {
                AttemptStatus::Succeeded => {
                    return Err(PaymentError::AttemptAlreadySucceeded {
                        session_id: session_id.to_string(),
                        index,
                    })
                }
                AttemptStatus::Processing => {
                    return Err(PaymentError::InvalidRequest(format!(
                        "Attempt {} is already being processed",
                        index
                    )))
                }
                AttemptStatus::Pending => {}
                AttemptStatus::Failed => {
                    // Retry of a failed attempt; it no longer counts as failed.
                    state.failed_count -= 1;
                }
            }
            state.attempts[index].status = AttemptStatus::Processing;
            state.attempts[index].remote_id.clone()
        };

        // Phase 2: remote confirmation, no lock held.
        let confirm = self.inner.provider.confirm_charge(&remote_id, proof).await;

        // Phase 3: re-acquire the lock and apply the result atomically.
        let mut state = slot.state.lock().await;

        if state.is_terminal() {
            // The timeout (or an explicit cancel) fired while the charge was
            // in flight. The sweep never saw this attempt as succeeded, so a
            // late remote success is compensated here, exactly once.
            let late_success =
                matches!(&confirm, Ok(outcome) if outcome.status == ChargeStatus::Succeeded);
            if late_success {
                state.attempts[index].status = AttemptStatus::Failed;
                state.failed_count += 1;
            }
            drop(state);
            if late_success {
                warn!(
                    "Charge {} succeeded after session {} closed; issuing compensating refund",
                    remote_id, session_id
                );
                self.inner
                    .refund_best_effort(session_id, &remote_id, index)
                    .await;
            }
            return Err(PaymentError::SessionClosed {
                session_id: session_id.to_string(),
            });
        }

        match confirm {
            Ok(outcome) if outcome.status == ChargeStatus::Succeeded => {
                // The webhook path may have settled this attempt while the
                // confirm was in flight; settlement is idempotent.
                if state.attempts[index].status != AttemptStatus::Succeeded {
                    state.attempts[index].status = AttemptStatus::Succeeded;
                    state.completed_count += 1;
                }
                let payment = PaymentOutcome::success(&remote_id, IntentStatus::Succeeded);

                if state.is_complete() {
                    state.status = SessionStatus::Succeeded;
                    slot.timer.disarm();
                    let snapshot = state.clone();
                    drop(state);
                    self.inner.store.remove(&snapshot);
                    info!("Split session {} completed", session_id);
                    self.inner.bus.emit(&GatewayEvent::PaymentSuccess(payment.clone()));
                    self.inner.bus.emit(&GatewayEvent::SplitCompleted(snapshot.clone()));
                    Ok(AttemptResult {
                        outcome: payment,
                        session: snapshot,
                    })
                } else {
                    state.status = SessionStatus::Partial;
                    let snapshot = state.clone();
                    drop(state);
                    self.inner.bus.emit(&GatewayEvent::PaymentSuccess(payment.clone()));
                    self.inner.bus.emit(&GatewayEvent::SplitPartial(snapshot.clone()));
                    Ok(AttemptResult {
                        outcome: payment,
                        session: snapshot,
                    })
                }
            }
            Ok(outcome) if outcome.status == ChargeStatus::RequiresAction => {
                // Not a success, not a failure: the attempt stays open for
                // retry and settlement may arrive via the webhook path.
                state.attempts[index].status = AttemptStatus::Pending;
                let payment = PaymentOutcome {
                    success: false,
                    payment_id: remote_id.clone(),
                    status: IntentStatus::RequiresAction,
                    error: outcome.message,
                };
                let snapshot = state.clone();
                drop(state);
                self.inner
                    .bus
                    .emit(&GatewayEvent::PaymentRequiresAction(payment.clone()));
                Ok(AttemptResult {
                    outcome: payment,
                    session: snapshot,
                })
            }
            Ok(outcome) => {
                let message = outcome
                    .message
                    .unwrap_or_else(|| "Payment failed".to_string());
                Ok(self.record_attempt_failure(state, index, &remote_id, message))
            }
            Err(e) => {
                // Transport errors are treated like a decline: recorded
                // against the attempt, never terminal for the session.
                Ok(self.record_attempt_failure(state, index, &remote_id, e.to_string()))
            }
        }
    }

    fn record_attempt_failure(
        &self,
        mut state: tokio::sync::MutexGuard<'_, SplitSession>,
        index: usize,
        remote_id: &str,
        message: String,
    ) -> AttemptResult {
        state.attempts[index].status = AttemptStatus::Failed;
        state.failed_count += 1;
        let payment = PaymentOutcome::failure(remote_id, IntentStatus::Failed, message);
        let snapshot = state.clone();
        drop(state);
        debug!(
            "Attempt {} of session {} failed: {:?}",
            index, snapshot.session_id, payment.error
        );
        self.inner.bus.emit(&GatewayEvent::PaymentFailed(payment.clone()));
        AttemptResult {
            outcome: payment,
            session: snapshot,
        }
    }

    /// Explicit caller-initiated cancellation: disarms the timer and runs
    /// the same refund/cancel sweep as the timeout handler.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn cancel_session(&self, session_id: &str) -> PaymentResult<SplitSession> {
        let slot = self.inner.store.get(session_id).ok_or_else(|| {
            PaymentError::SessionNotFound {
                session_id: session_id.to_string(),
            }
        })?;

        slot.timer.disarm();

        let snapshot = {
            let mut state = slot.state.lock().await;
            if state.is_terminal() {
                return Err(PaymentError::SessionClosed {
                    session_id: session_id.to_string(),
                });
            }
            state.status = SessionStatus::Canceled;
            state.clone()
        };

        info!("Canceling split session {} on caller request", session_id);
        self.inner.compensation_sweep(&snapshot).await;
        self.inner.store.remove(&snapshot);

        let payment = PaymentOutcome::success(&snapshot.session_id, IntentStatus::Canceled);
        self.inner.bus.emit(&GatewayEvent::PaymentCanceled(payment));
        Ok(snapshot)
    }

    /// Read a consistent snapshot of a live session
    pub async fn session_snapshot(&self, session_id: &str) -> PaymentResult<SplitSession> {
        let slot = self.inner.store.get(session_id).ok_or_else(|| {
            PaymentError::SessionNotFound {
                session_id: session_id.to_string(),
            }
        })?;
        let state = slot.state.lock().await;
        Ok(state.clone())
    }

    /// Settle an attempt from a verified inbound processor event.
    ///
    /// Resolution goes through the `remote_id` index, so cost is O(1) in
    /// the number of sessions. Settlement is idempotent: events for
    /// already-settled attempts (and for terminal sessions) are ignored.
    #[instrument(skip(self, event), fields(remote_id = %event.remote_id))]
    pub async fn apply_remote_event(&self, event: &RemoteChargeEvent) -> PaymentResult<()> {
        // Single payments settle directly against their stored intent.
        if self.inner.singles.contains_key(&event.remote_id) {
            return self.apply_single_remote_event(event);
        }

        let (session_id, index) =
            self.inner
                .store
                .resolve_remote(&event.remote_id)
                .ok_or_else(|| PaymentError::IntentNotFound {
                    remote_id: event.remote_id.clone(),
                })?;
        let slot = self.inner.store.get(&session_id).ok_or_else(|| {
            PaymentError::IntentNotFound {
                remote_id: event.remote_id.clone(),
            }
        })?;

        let mut state = slot.state.lock().await;
        if state.is_terminal() {
            return Ok(());
        }

        match &event.kind {
            RemoteEventKind::ChargeSucceeded => {
                match state.attempts[index].status {
                    AttemptStatus::Succeeded => return Ok(()), // already settled
                    AttemptStatus::Failed => {
                        // Remote settlement supersedes the locally recorded failure.
                        state.failed_count -= 1;
                    }
                    AttemptStatus::Pending | AttemptStatus::Processing => {}
                }
                state.attempts[index].status = AttemptStatus::Succeeded;
                state.completed_count += 1;
                let payment = PaymentOutcome::success(&event.remote_id, IntentStatus::Succeeded);

                if state.is_complete() {
                    state.status = SessionStatus::Succeeded;
                    slot.timer.disarm();
                    let snapshot = state.clone();
                    drop(state);
                    self.inner.store.remove(&snapshot);
                    self.inner.bus.emit(&GatewayEvent::PaymentSuccess(payment));
                    self.inner.bus.emit(&GatewayEvent::SplitCompleted(snapshot));
                } else {
                    state.status = SessionStatus::Partial;
                    let snapshot = state.clone();
                    drop(state);
                    self.inner.bus.emit(&GatewayEvent::PaymentSuccess(payment));
                    self.inner.bus.emit(&GatewayEvent::SplitPartial(snapshot));
                }
                Ok(())
            }
            RemoteEventKind::ChargeFailed => {
                match state.attempts[index].status {
                    AttemptStatus::Succeeded | AttemptStatus::Failed => Ok(()), // stale or duplicate
                    AttemptStatus::Pending | AttemptStatus::Processing => {
                        state.attempts[index].status = AttemptStatus::Failed;
                        state.failed_count += 1;
                        let message = event
                            .message
                            .clone()
                            .unwrap_or_else(|| "Payment failed".to_string());
                        let payment = PaymentOutcome::failure(
                            &event.remote_id,
                            IntentStatus::Failed,
                            message,
                        );
                        drop(state);
                        self.inner.bus.emit(&GatewayEvent::PaymentFailed(payment));
                        Ok(())
                    }
                }
            }
            RemoteEventKind::ChargeCanceled | RemoteEventKind::Unknown(_) => {
                debug!("Ignoring remote event {:?} for {}", event.kind, event.remote_id);
                Ok(())
            }
        }
    }

    fn apply_single_remote_event(&self, event: &RemoteChargeEvent) -> PaymentResult<()> {
        let payment = {
            let Some(mut single) = self.inner.singles.get_mut(&event.remote_id) else {
                return Err(PaymentError::IntentNotFound {
                    remote_id: event.remote_id.clone(),
                });
            };
            match &event.kind {
                RemoteEventKind::ChargeSucceeded => {
                    if single.status == IntentStatus::Succeeded {
                        return Ok(());
                    }
                    single.status = IntentStatus::Succeeded;
                    Some(GatewayEvent::PaymentSuccess(PaymentOutcome::success(
                        &event.remote_id,
                        IntentStatus::Succeeded,
                    )))
                }
                RemoteEventKind::ChargeFailed => {
                    if single.status.is_terminal() {
                        return Ok(());
                    }
                    single.status = IntentStatus::Failed;
                    let message = event
                        .message
                        .clone()
                        .unwrap_or_else(|| "Payment failed".to_string());
                    Some(GatewayEvent::PaymentFailed(PaymentOutcome::failure(
                        &event.remote_id,
                        IntentStatus::Failed,
                        message,
                    )))
                }
                RemoteEventKind::ChargeCanceled => {
                    single.status = IntentStatus::Canceled;
                    None
                }
                RemoteEventKind::Unknown(_) => None,
            }
        };

        if let Some(event) = payment {
            self.inner.bus.emit(&event);
        }
        Ok(())
    }
}

impl GatewayInner {
    /// Timeout handler: fires once at `expires_at` unless disarmed earlier
    /// by full success or explicit cancellation.
    pub(crate) async fn handle_timeout(&self, session_id: &str) {
        let Some(slot) = self.store.get(session_id) else {
            return;
        };

        let snapshot = {
            let mut state = slot.state.lock().await;
            if state.is_terminal() {
                return;
            }
            state.status = SessionStatus::Canceled;
            state.clone()
        };

        info!(
            "Split session {} timed out: {}/{} attempts completed; starting refund sweep",
            session_id,
            snapshot.completed_count,
            snapshot.attempts.len()
        );

        // The emission waits for the whole batch to settle.
        self.compensation_sweep(&snapshot).await;
        self.store.remove(&snapshot);
        self.bus.emit(&GatewayEvent::SplitTimeout(snapshot));
    }

    /// Refund every succeeded attempt and cancel every still-open intent,
    /// concurrently and independently. Individual failures are logged,
    /// never propagated; the sweep always completes.
    pub(crate) async fn compensation_sweep(&self, session: &SplitSession) {
        let mut join_set: JoinSet<Result<(), String>> = JoinSet::new();

        for attempt in &session.attempts {
            let provider = Arc::clone(&self.provider);
            let session_id = session.session_id.clone();
            let remote_id = attempt.remote_id.clone();
            let index = attempt.index;

            match attempt.status {
                AttemptStatus::Succeeded => {
                    join_set.spawn(async move {
                        let req = RefundRequest::full(remote_id.clone(), RefundReason::Other)
                            .with_metadata("reason", REFUND_REASON_TIMEOUT)
                            .with_metadata("session_id", session_id);
                        match provider.refund(req).await {
                            Ok(refund) => {
                                info!(
                                    "Refunded attempt {} ({}): refund {}",
                                    index, remote_id, refund.refund_id
                                );
                                Ok(())
                            }
                            Err(e) => Err(format!(
                                "refund of attempt {} ({}) failed: {}",
                                index, remote_id, e
                            )),
                        }
                    });
                }
                AttemptStatus::Pending | AttemptStatus::Processing => {
                    join_set.spawn(async move {
                        match provider.cancel_charge_intent(&remote_id).await {
                            Ok(_) => Ok(()),
                            Err(e) => Err(format!(
                                "cancel of attempt {} ({}) failed: {}",
                                index, remote_id, e
                            )),
                        }
                    });
                }
                AttemptStatus::Failed => {}
            }
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(msg)) => warn!("Compensation sweep: {}", msg),
                Err(e) => warn!("Compensation sweep task failed: {}", e),
            }
        }
    }

    /// Best-effort cancel of intents left over from a failed provisioning
    pub(crate) async fn cancel_intents_best_effort(&self, remote_ids: &[String]) {
        let mut join_set: JoinSet<Result<(), String>> = JoinSet::new();
        for remote_id in remote_ids {
            let provider = Arc::clone(&self.provider);
            let remote_id = remote_id.clone();
            join_set.spawn(async move {
                provider
                    .cancel_charge_intent(&remote_id)
                    .await
                    .map(|_| ())
                    .map_err(|e| format!("cancel of {} failed: {}", remote_id, e))
            });
        }
        while let Some(joined) = join_set.join_next().await {
            if let Ok(Err(msg)) = joined {
                warn!("Provisioning cleanup: {}", msg);
            }
        }
    }

    /// Compensating refund for a charge that succeeded after its session
    /// closed; failure is logged, not propagated.
    pub(crate) async fn refund_best_effort(&self, session_id: &str, remote_id: &str, index: usize) {
        let req = RefundRequest::full(remote_id.to_string(), RefundReason::Other)
            .with_metadata("reason", REFUND_REASON_TIMEOUT)
            .with_metadata("session_id", session_id.to_string());
        match self.provider.refund(req).await {
            Ok(refund) => info!(
                "Refunded late success on attempt {} ({}): refund {}",
                index, remote_id, refund.refund_id
            ),
            Err(e) => warn!(
                "Failed to refund late success on attempt {} ({}): {}",
                index, remote_id, e
            ),
        }
    }
}
