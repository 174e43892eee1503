//! # Session Store
//!
//! Concurrent registry of live split sessions. Each session gets its own
//! lock and timer; cross-session operations never contend.
//!
//! The store also maintains the `remote_id -> (session_id, attempt_index)`
//! index so inbound processor events resolve to their owning attempt in
//! O(1) instead of scanning every session.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use vsplit_core::{PaymentTimer, SplitSession};

/// Index entry pointing an inbound charge event back at its attempt
#[derive(Debug, Clone)]
pub(crate) struct RemoteRef {
    pub session_id: String,
    pub attempt_index: usize,
}

/// One live session: its canonical state and its timeout timer
pub(crate) struct SessionSlot {
    pub state: Mutex<SplitSession>,
    pub timer: PaymentTimer,
}

pub(crate) struct SessionStore {
    sessions: DashMap<String, Arc<SessionSlot>>,
    remote_index: DashMap<String, RemoteRef>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            remote_index: DashMap::new(),
        }
    }

    /// Register a freshly created session and index its attempts
    pub fn insert(&self, session: SplitSession) -> Arc<SessionSlot> {
        let session_id = session.session_id.clone();
        for attempt in &session.attempts {
            self.remote_index.insert(
                attempt.remote_id.clone(),
                RemoteRef {
                    session_id: session_id.clone(),
                    attempt_index: attempt.index,
                },
            );
        }

        let slot = Arc::new(SessionSlot {
            state: Mutex::new(session),
            timer: PaymentTimer::new(),
        });
        self.sessions.insert(session_id, Arc::clone(&slot));
        slot
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        self.sessions.get(session_id).map(|s| Arc::clone(&s))
    }

    /// Resolve an inbound charge event to its owning attempt
    pub fn resolve_remote(&self, remote_id: &str) -> Option<(String, usize)> {
        self.remote_index
            .get(remote_id)
            .map(|r| (r.session_id.clone(), r.attempt_index))
    }

    /// Discard a terminal session and its index entries
    pub fn remove(&self, session: &SplitSession) {
        for attempt in &session.attempts {
            self.remote_index.remove(&attempt.remote_id);
        }
        self.sessions.remove(&session.session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
