//! # Payment Timer
//!
//! Single-purpose cancellable delayed-callback primitive used to schedule
//! session timeouts. Explicit arm/disarm, independent of any redraw or
//! polling cadence.
//!
//! Cancellation is deterministic: a disarm that lands before the deadline
//! guarantees the callback never runs; a disarm after the timer has fired
//! is a safe no-op.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct ArmedTimer {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// A one-shot timer bound to a single session
pub struct PaymentTimer {
    inner: Mutex<Option<ArmedTimer>>,
}

impl PaymentTimer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Arm the timer. After `duration`, `on_fire` runs exactly once unless
    /// [`disarm`](Self::disarm) wins the race first. Arming again replaces
    /// any previously armed deadline.
    pub fn arm<F>(&self, duration: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => on_fire.await,
                _ = cancel_rx => {}
            }
        });

        let previous = self.inner.lock().replace(ArmedTimer {
            cancel: Some(cancel_tx),
            handle,
        });
        if let Some(mut old) = previous {
            if let Some(tx) = old.cancel.take() {
                let _ = tx.send(());
            }
        }
    }

    /// Disarm the timer. If it has already fired (or was never armed) this
    /// is a no-op; otherwise the callback is guaranteed not to run.
    pub fn disarm(&self) {
        if let Some(mut armed) = self.inner.lock().take() {
            if let Some(tx) = armed.cancel.take() {
                // Send fails if the timer task already completed the select;
                // in that case the callback has run and there is nothing to stop.
                let _ = tx.send(());
            }
        }
    }

    /// Whether a deadline is armed and its task has not finished
    pub fn is_armed(&self) -> bool {
        self.inner
            .lock()
            .as_ref()
            .map(|armed| !armed.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Default for PaymentTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PaymentTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_duration() {
        let timer = PaymentTimer::new();
        let fired = Arc::new(AtomicBool::new(false));

        let fired2 = Arc::clone(&fired);
        timer.arm(Duration::from_secs(10), async move {
            fired2.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_before_fire_suppresses_callback() {
        let timer = PaymentTimer::new();
        let fired = Arc::new(AtomicBool::new(false));

        let fired2 = Arc::clone(&fired);
        timer.arm(Duration::from_secs(10), async move {
            fired2.store(true, Ordering::SeqCst);
        });

        assert!(timer.is_armed());
        timer.disarm();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_after_fire_is_noop() {
        let timer = PaymentTimer::new();
        let fired = Arc::new(AtomicBool::new(false));

        let fired2 = Arc::clone(&fired);
        timer.arm(Duration::from_millis(10), async move {
            fired2.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(Ordering::SeqCst));

        timer.disarm();
        timer.disarm();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_deadline() {
        let timer = PaymentTimer::new();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        let first2 = Arc::clone(&first);
        timer.arm(Duration::from_secs(5), async move {
            first2.store(true, Ordering::SeqCst);
        });

        let second2 = Arc::clone(&second);
        timer.arm(Duration::from_secs(10), async move {
            second2.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }
}
