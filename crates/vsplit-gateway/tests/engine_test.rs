//! Scenario tests for the split-payment session engine, driven against the
//! in-memory provider with a paused clock.

mod common;

use common::{capture_events, count_kind, MockProvider};
use std::sync::Arc;
use std::time::Duration;
use vsplit_core::{
    AttemptStatus, Currency, EventKind, GatewayEvent, InstrumentProof, PaymentError,
    RemoteChargeEvent, RemoteEventKind, SessionStatus, SplitSpec,
};
use vsplit_gateway::{GatewayConfig, SplitGateway, SplitSessionConfig};

fn gateway_with(provider: Arc<MockProvider>) -> SplitGateway {
    SplitGateway::new(provider, GatewayConfig::default())
}

fn two_card_config() -> SplitSessionConfig {
    SplitSessionConfig::new(vec![
        SplitSpec::new(6000).with_label("Card 1"),
        SplitSpec::new(4000).with_label("Card 2"),
    ])
}

fn ok() -> InstrumentProof {
    InstrumentProof::new("pm_ok")
}

fn declined() -> InstrumentProof {
    InstrumentProof::new("pm_declined")
}

fn succeeded_event(remote_id: &str) -> RemoteChargeEvent {
    RemoteChargeEvent {
        event_id: format!("evt_{}", remote_id),
        remote_id: remote_id.to_string(),
        kind: RemoteEventKind::ChargeSucceeded,
        message: None,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test(start_paused = true)]
async fn create_session_provisions_one_intent_per_split() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));

    let session = gateway
        .create_split_session(two_card_config().with_order_id("order_100"))
        .await
        .unwrap();

    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.order_id, "order_100");
    assert_eq!(session.total_amount, 10000);
    assert_eq!(session.attempts.len(), 2);
    assert_eq!(session.completed_count, 0);
    assert_eq!(session.failed_count, 0);
    assert_eq!(
        session.expires_at - session.created_at,
        chrono::Duration::seconds(600)
    );

    // Attempts preserve input order by index regardless of provisioning
    // completion order.
    assert_eq!(session.attempts[0].amount, 6000);
    assert_eq!(session.attempts[0].label.as_deref(), Some("Card 1"));
    assert_eq!(session.attempts[1].amount, 4000);
    assert_ne!(session.attempts[0].remote_id, session.attempts[1].remote_id);
    assert!(session.attempts.iter().all(|a| a.status == AttemptStatus::Pending));

    assert_eq!(provider.create_count(), 2);
    assert_eq!(gateway.active_sessions(), 1);

    let sum: i64 = session.attempts.iter().map(|a| a.amount).sum();
    assert_eq!(sum, session.total_amount);
}

#[tokio::test(start_paused = true)]
async fn create_session_respects_caller_timeout() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);

    let session = gateway
        .create_split_session(two_card_config().with_timeout(Duration::from_secs(300)))
        .await
        .unwrap();

    assert_eq!(
        session.expires_at - session.created_at,
        chrono::Duration::seconds(300)
    );
}

#[tokio::test(start_paused = true)]
async fn validation_rejects_bad_split_configurations() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));

    // Too few contributors
    let err = gateway
        .create_split_session(SplitSessionConfig::new(vec![SplitSpec::new(1000)]))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSplit { .. }));

    // Too many contributors
    let splits: Vec<_> = (0..11).map(|_| SplitSpec::new(100)).collect();
    let err = gateway
        .create_split_session(SplitSessionConfig::new(splits))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSplit { .. }));

    // Non-positive amount
    let err = gateway
        .create_split_session(SplitSessionConfig::new(vec![
            SplitSpec::new(1000),
            SplitSpec::new(0),
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSplit { .. }));

    // Mismatched declared total
    let err = gateway
        .create_split_session(two_card_config().with_total_amount(9999))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSplit { .. }));

    // Never partially provisioned: no remote call was made
    assert_eq!(provider.create_count(), 0);
    assert_eq!(gateway.active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn provisioning_failure_is_atomic_and_cancels_created_intents() {
    let provider = MockProvider::new();
    provider.fail_create_for_split(1);
    let gateway = gateway_with(Arc::clone(&provider));

    let err = gateway.create_split_session(two_card_config()).await.unwrap_err();
    assert!(matches!(err, PaymentError::ProvisioningFailed { .. }));

    // No session exposed; the intent that did get created was canceled.
    assert_eq!(gateway.active_sessions(), 0);
    assert_eq!(provider.create_count(), 1);
    assert_eq!(provider.canceled_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn all_attempts_succeeding_completes_the_session() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let sid = session.session_id.clone();

    let first = gateway.attempt(&sid, 0, &ok()).await.unwrap();
    assert!(first.outcome.success);
    assert_eq!(first.session.status, SessionStatus::Partial);
    assert_eq!(first.session.completed_count, 1);
    assert_eq!(count_kind(&events, EventKind::SplitPartial), 1);

    let second = gateway.attempt(&sid, 1, &ok()).await.unwrap();
    assert_eq!(second.session.status, SessionStatus::Succeeded);
    assert_eq!(second.session.completed_count, 2);
    assert!(second.session.is_complete());

    assert_eq!(count_kind(&events, EventKind::SplitCompleted), 1);
    assert_eq!(count_kind(&events, EventKind::PaymentSuccess), 2);

    // Terminal sessions are discarded.
    assert_eq!(gateway.active_sessions(), 0);

    // The timer was disarmed: letting the deadline pass runs no sweep.
    tokio::time::sleep(Duration::from_secs(700)).await;
    assert!(provider.refunded_ids().is_empty());
    assert!(provider.canceled_ids().is_empty());
    assert_eq!(count_kind(&events, EventKind::SplitTimeout), 0);
}

#[tokio::test(start_paused = true)]
async fn declined_attempt_keeps_session_open_for_retry() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let sid = session.session_id.clone();

    let result = gateway.attempt(&sid, 0, &declined()).await.unwrap();
    assert!(!result.outcome.success);
    assert_eq!(result.session.status, SessionStatus::Pending);
    assert_eq!(result.session.failed_count, 1);
    assert_eq!(result.session.attempts[0].status, AttemptStatus::Failed);
    assert_eq!(count_kind(&events, EventKind::PaymentFailed), 1);

    // Retry of the failed attempt is allowed and can still complete the
    // session together with the other attempt.
    let retry = gateway.attempt(&sid, 0, &ok()).await.unwrap();
    assert!(retry.outcome.success);
    assert_eq!(retry.session.failed_count, 0);
    assert_eq!(retry.session.status, SessionStatus::Partial);

    let last = gateway.attempt(&sid, 1, &ok()).await.unwrap();
    assert_eq!(last.session.status, SessionStatus::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn transport_error_is_recorded_like_a_decline() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let result = gateway
        .attempt(&session.session_id, 0, &InstrumentProof::new("pm_network_error"))
        .await
        .unwrap();

    assert!(!result.outcome.success);
    assert_eq!(result.session.attempts[0].status, AttemptStatus::Failed);
    assert_eq!(result.session.status, SessionStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn retrying_a_succeeded_attempt_is_rejected_without_side_effects() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let sid = session.session_id.clone();

    gateway.attempt(&sid, 0, &ok()).await.unwrap();
    let before = gateway.session_snapshot(&sid).await.unwrap();

    let err = gateway.attempt(&sid, 0, &ok()).await.unwrap_err();
    assert!(matches!(err, PaymentError::AttemptAlreadySucceeded { .. }));

    let after = gateway.session_snapshot(&sid).await.unwrap();
    assert_eq!(after.completed_count, before.completed_count);
    assert_eq!(after.status, before.status);
    assert_eq!(count_kind(&events, EventKind::PaymentSuccess), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_index_is_rejected() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let err = gateway.attempt(&session.session_id, 5, &ok()).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidAttempt { index: 5, .. }));
}

#[tokio::test(start_paused = true)]
async fn timeout_refunds_succeeded_attempts_and_cancels_open_ones() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let sid = session.session_id.clone();
    let refunded_remote = session.attempts[0].remote_id.clone();
    let open_remote = session.attempts[1].remote_id.clone();

    gateway.attempt(&sid, 0, &ok()).await.unwrap();

    // Let the session deadline pass; the timer drives the sweep.
    tokio::time::sleep(Duration::from_secs(601)).await;

    assert_eq!(provider.refunded_ids(), vec![refunded_remote]);
    assert_eq!(provider.canceled_ids(), vec![open_remote]);

    // Refunds carry the timeout reason tag.
    let refunds = provider.refunds.lock();
    assert_eq!(
        refunds[0].metadata.get("reason").map(String::as_str),
        Some("split_payment_timeout")
    );
    drop(refunds);

    assert_eq!(count_kind(&events, EventKind::SplitTimeout), 1);
    let log = events.lock();
    let timeout_snapshot = log
        .iter()
        .find_map(|e| match e {
            GatewayEvent::SplitTimeout(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap();
    drop(log);

    // Counters are preserved post-refund: the snapshot shows how many
    // attempts succeeded (and were therefore refunded).
    assert_eq!(timeout_snapshot.status, SessionStatus::Canceled);
    assert_eq!(timeout_snapshot.completed_count, 1);

    // The session is discarded once the sweep has settled.
    assert_eq!(gateway.active_sessions(), 0);
    assert!(matches!(
        gateway.attempt(&sid, 1, &ok()).await.unwrap_err(),
        PaymentError::SessionNotFound { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn timeout_after_decline_refunds_only_the_succeeded_attempt() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let sid = session.session_id.clone();
    let refunded_remote = session.attempts[0].remote_id.clone();

    gateway.attempt(&sid, 0, &ok()).await.unwrap();
    gateway.attempt(&sid, 1, &declined()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(601)).await;

    // Attempt 0 refunded; attempt 1 already failed, so there is no open
    // intent left to cancel.
    assert_eq!(provider.refunded_ids(), vec![refunded_remote]);
    assert!(provider.canceled_ids().is_empty());
    assert_eq!(count_kind(&events, EventKind::SplitTimeout), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_with_zero_successes_cancels_everything() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(601)).await;

    assert!(provider.refunded_ids().is_empty());
    assert_eq!(provider.canceled_ids().len(), 2);

    let log = events.lock();
    let snapshot = log
        .iter()
        .find_map(|e| match e {
            GatewayEvent::SplitTimeout(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap();
    drop(log);
    assert_eq!(snapshot.status, SessionStatus::Canceled);
    assert_eq!(snapshot.completed_count, 0);
    assert!(session.attempts.len() == 2);
}

#[tokio::test(start_paused = true)]
async fn refund_failure_does_not_block_the_rest_of_the_sweep() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));
    let events = capture_events(&gateway);

    let session = gateway
        .create_split_session(SplitSessionConfig::new(vec![
            SplitSpec::new(3000),
            SplitSpec::new(3000),
            SplitSpec::new(4000),
        ]))
        .await
        .unwrap();
    let sid = session.session_id.clone();

    gateway.attempt(&sid, 0, &ok()).await.unwrap();
    gateway.attempt(&sid, 1, &ok()).await.unwrap();

    let snapshot = gateway.session_snapshot(&sid).await.unwrap();
    provider.fail_refund_for(&snapshot.attempts[0].remote_id);

    tokio::time::sleep(Duration::from_secs(601)).await;

    // One refund failed, the other succeeded, the open intent was
    // canceled, and the timeout still settled the session.
    assert_eq!(provider.refunded_ids(), vec![snapshot.attempts[1].remote_id.clone()]);
    assert_eq!(provider.canceled_ids(), vec![snapshot.attempts[2].remote_id.clone()]);
    assert_eq!(count_kind(&events, EventKind::SplitTimeout), 1);
    assert_eq!(gateway.active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn explicit_cancel_runs_the_same_sweep() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let sid = session.session_id.clone();

    gateway.attempt(&sid, 0, &ok()).await.unwrap();

    let canceled = gateway.cancel_session(&sid).await.unwrap();
    assert_eq!(canceled.status, SessionStatus::Canceled);
    assert_eq!(provider.refunded_ids(), vec![canceled.attempts[0].remote_id.clone()]);
    assert_eq!(provider.canceled_ids(), vec![canceled.attempts[1].remote_id.clone()]);
    assert_eq!(count_kind(&events, EventKind::PaymentCanceled), 1);
    assert_eq!(gateway.active_sessions(), 0);

    // The timer was disarmed: the deadline passing later changes nothing.
    tokio::time::sleep(Duration::from_secs(700)).await;
    assert_eq!(count_kind(&events, EventKind::SplitTimeout), 0);
    assert_eq!(provider.refunded_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_of_unknown_session_is_rejected() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);

    let err = gateway.cancel_session("split_missing").await.unwrap_err();
    assert!(matches!(err, PaymentError::SessionNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn remote_events_settle_attempts_through_the_index() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let sid = session.session_id.clone();
    let remote_0 = session.attempts[0].remote_id.clone();
    let remote_1 = session.attempts[1].remote_id.clone();

    gateway.apply_remote_event(&succeeded_event(&remote_0)).await.unwrap();
    let snapshot = gateway.session_snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Partial);
    assert_eq!(snapshot.completed_count, 1);

    // Settlement is idempotent.
    gateway.apply_remote_event(&succeeded_event(&remote_0)).await.unwrap();
    let snapshot = gateway.session_snapshot(&sid).await.unwrap();
    assert_eq!(snapshot.completed_count, 1);
    assert_eq!(count_kind(&events, EventKind::PaymentSuccess), 1);

    // The second attempt settling completes the session.
    gateway.apply_remote_event(&succeeded_event(&remote_1)).await.unwrap();
    assert_eq!(count_kind(&events, EventKind::SplitCompleted), 1);
    assert_eq!(gateway.active_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_event_records_the_attempt_failure() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);
    let events = capture_events(&gateway);

    let session = gateway.create_split_session(two_card_config()).await.unwrap();
    let remote_0 = session.attempts[0].remote_id.clone();

    let event = RemoteChargeEvent {
        event_id: "evt_fail".to_string(),
        remote_id: remote_0,
        kind: RemoteEventKind::ChargeFailed,
        message: Some("Your card was declined.".to_string()),
        created_at: chrono::Utc::now(),
    };
    gateway.apply_remote_event(&event).await.unwrap();

    let snapshot = gateway.session_snapshot(&session.session_id).await.unwrap();
    assert_eq!(snapshot.attempts[0].status, AttemptStatus::Failed);
    assert_eq!(snapshot.failed_count, 1);
    assert_eq!(count_kind(&events, EventKind::PaymentFailed), 1);
}

#[tokio::test(start_paused = true)]
async fn remote_event_for_unknown_intent_is_rejected() {
    let provider = MockProvider::new();
    let gateway = gateway_with(provider);

    let err = gateway
        .apply_remote_event(&succeeded_event("pi_unknown"))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::IntentNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn sessions_are_independent() {
    let provider = MockProvider::new();
    let gateway = gateway_with(Arc::clone(&provider));

    let a = gateway
        .create_split_session(two_card_config().with_currency(Currency::USD))
        .await
        .unwrap();
    let b = gateway.create_split_session(two_card_config()).await.unwrap();
    assert_eq!(gateway.active_sessions(), 2);

    // Completing one session leaves the other untouched.
    gateway.attempt(&a.session_id, 0, &ok()).await.unwrap();
    gateway.attempt(&a.session_id, 1, &ok()).await.unwrap();
    assert_eq!(gateway.active_sessions(), 1);

    let b_snapshot = gateway.session_snapshot(&b.session_id).await.unwrap();
    assert_eq!(b_snapshot.status, SessionStatus::Pending);
    assert_eq!(b_snapshot.completed_count, 0);
}
