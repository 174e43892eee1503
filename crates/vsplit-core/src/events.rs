//! # Gateway Event Bus
//!
//! Typed publish/subscribe channel decoupling the session engine from its
//! consumers. This is a synchronous callback multiplexer, not a message
//! queue: `emit` runs every listener inline, and a panicking listener is
//! isolated so the remaining listeners still run.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vsplit_core::{EventBus, EventKind, GatewayEvent};
//!
//! let bus = EventBus::new();
//! let id = bus.on(EventKind::SplitCompleted, |event| {
//!     if let GatewayEvent::SplitCompleted(session) = event {
//!         println!("order {} fully paid", session.order_id);
//!     }
//! });
//! // ...
//! bus.off(EventKind::SplitCompleted, id);
//! ```

use crate::intent::PaymentOutcome;
use crate::session::SplitSession;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Event emitted by the gateway
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A charge confirmation succeeded
    PaymentSuccess(PaymentOutcome),
    /// A charge confirmation failed or was declined
    PaymentFailed(PaymentOutcome),
    /// The processor requires an additional customer step
    PaymentRequiresAction(PaymentOutcome),
    /// A payment or session was canceled by the caller
    PaymentCanceled(PaymentOutcome),
    /// Every attempt in a split session succeeded
    SplitCompleted(SplitSession),
    /// A split session progressed but is not yet complete
    SplitPartial(SplitSession),
    /// A split session timed out; the snapshot reflects the refund sweep
    SplitTimeout(SplitSession),
    /// An internal error surfaced to listeners
    Error(String),
}

impl GatewayEvent {
    /// The kind a listener subscribes to
    pub fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::PaymentSuccess(_) => EventKind::PaymentSuccess,
            GatewayEvent::PaymentFailed(_) => EventKind::PaymentFailed,
            GatewayEvent::PaymentRequiresAction(_) => EventKind::PaymentRequiresAction,
            GatewayEvent::PaymentCanceled(_) => EventKind::PaymentCanceled,
            GatewayEvent::SplitCompleted(_) => EventKind::SplitCompleted,
            GatewayEvent::SplitPartial(_) => EventKind::SplitPartial,
            GatewayEvent::SplitTimeout(_) => EventKind::SplitTimeout,
            GatewayEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Subscription key for the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PaymentSuccess,
    PaymentFailed,
    PaymentRequiresAction,
    PaymentCanceled,
    SplitCompleted,
    SplitPartial,
    SplitTimeout,
    Error,
}

impl EventKind {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PaymentSuccess => "payment:success",
            EventKind::PaymentFailed => "payment:failed",
            EventKind::PaymentRequiresAction => "payment:requires_action",
            EventKind::PaymentCanceled => "payment:canceled",
            EventKind::SplitCompleted => "split:completed",
            EventKind::SplitPartial => "split:partial",
            EventKind::SplitTimeout => "split:timeout",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle identifying one registration; removal is idempotent per handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&GatewayEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

/// Synchronous event multiplexer
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to an event kind; returns the handle used to unsubscribe
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(callback))
    }

    /// Subscribe for a single delivery; the listener removes itself after
    /// its first invocation
    pub fn once<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(callback))
    }

    fn register(&self, kind: EventKind, once: bool, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push(Listener { id, once, callback });
        id
    }

    /// Unsubscribe a listener. Removing an already-removed handle is a
    /// safe no-op.
    pub fn off(&self, kind: EventKind, id: ListenerId) {
        if let Some(list) = self.listeners.lock().get_mut(&kind) {
            list.retain(|l| l.id != id);
        }
    }

    /// Emit an event to every listener registered for its kind.
    ///
    /// Listeners run inline in registration order. A panicking listener is
    /// caught and logged; the remaining listeners still run.
    pub fn emit(&self, event: &GatewayEvent) {
        let kind = event.kind();
        let batch: Vec<(ListenerId, bool, Callback)> = {
            let listeners = self.listeners.lock();
            match listeners.get(&kind) {
                Some(list) => list
                    .iter()
                    .map(|l| (l.id, l.once, Arc::clone(&l.callback)))
                    .collect(),
                None => return,
            }
        };

        let mut fired_once: Vec<ListenerId> = Vec::new();
        for (id, once, callback) in batch {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!("Listener for {} panicked; continuing with remaining listeners", kind);
            }
            if once {
                fired_once.push(id);
            }
        }

        if !fired_once.is_empty() {
            let mut listeners = self.listeners.lock();
            if let Some(list) = listeners.get_mut(&kind) {
                list.retain(|l| !fired_once.contains(&l.id));
            }
        }
    }

    /// Number of listeners registered for an event kind
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .get(&kind)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    /// Remove every listener, for all kinds
    pub fn remove_all_listeners(&self) {
        self.listeners.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
