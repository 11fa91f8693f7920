//! Cancellable handle to a live view subscription

use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{ViewEvent, ViewKey};

type Release = Box<dyn FnOnce() + Send>;

/// Open/closed flag held for the whole duration of every callback.
/// Reentrant so a callback may cancel its own subscription.
type Gate = Arc<ReentrantMutex<Cell<bool>>>;

/// A registered callback on a live view.
///
/// After [`cancel`](Self::cancel) returns, the callback is never invoked
/// again. A callback already running on another thread finishes first, so
/// callbacks should stay short. That wait blocks the calling thread, a tokio
/// worker included when called from async code, and two callbacks that
/// cancel each other's subscriptions can deadlock. Dropping the
/// subscription cancels it.
pub struct Subscription {
    key: ViewKey,
    gate: Gate,
    delivery: JoinHandle<()>,
    release: Mutex<Option<Release>>,
}

impl Subscription {
    pub(crate) fn start<T, F>(
        key: ViewKey,
        mut events: mpsc::UnboundedReceiver<ViewEvent<T>>,
        callback: F,
        release: impl FnOnce() + Send + 'static,
    ) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(ViewEvent<T>) + Send + 'static,
    {
        let gate: Gate = Arc::new(ReentrantMutex::new(Cell::new(true)));
        let delivery_gate = Arc::clone(&gate);

        let delivery = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !deliver(&delivery_gate, &callback, event) {
                    break;
                }
            }
        });

        Self {
            key,
            gate,
            delivery,
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        self.gate.lock().get()
    }

    /// Stop delivery and release this subscriber's share of the listener.
    /// Idempotent.
    pub fn cancel(&self) {
        {
            let open = self.gate.lock();
            if !open.get() {
                return;
            }
            open.set(false);
        }

        self.delivery.abort();
        if let Some(release) = self.release.lock().take() {
            release();
        }
        tracing::debug!(view = %self.key, "Subscription cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Run the callback unless the gate is closed; returns whether it was open
fn deliver<T, F>(gate: &ReentrantMutex<Cell<bool>>, callback: &F, event: ViewEvent<T>) -> bool
where
    F: Fn(ViewEvent<T>),
{
    let open = gate.lock();
    if !open.get() {
        return false;
    }
    callback(event);
    true
}
