//! Sync coordinator - registry of live views shared by subscribers

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use social_core::DocumentStore;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::view::LiveView;
use super::{BackoffPolicy, Subscription, SyncState, ViewEvent, ViewKey, ViewSource};
use crate::services::error::{ServiceError, ServiceResult};

struct ViewEntry {
    view: Arc<dyn Any + Send + Sync>,
    state: watch::Receiver<SyncState>,
}

impl ViewEntry {
    fn new<T: Send + Sync + 'static>(view: &Arc<LiveView<T>>) -> Self {
        Self {
            state: view.subscribe_state(),
            view: Arc::clone(view) as Arc<dyn Any + Send + Sync>,
        }
    }

    fn holds<T>(&self, view: &Arc<LiveView<T>>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.view).cast::<()>(),
            Arc::as_ptr(view).cast::<()>(),
        )
    }

    fn downcast<T: Send + Sync + 'static>(&self, key: &ViewKey) -> ServiceResult<Arc<LiveView<T>>> {
        Arc::clone(&self.view)
            .downcast::<LiveView<T>>()
            .map_err(|_| ServiceError::internal(format!("view {key} holds a different snapshot type")))
    }
}

/// Owns every live view and its store listener.
///
/// Subscribing to a key that already has a live view joins it; the store
/// listener is attached once per key and detached when the last subscriber
/// cancels.
pub struct SyncCoordinator {
    store: Arc<dyn DocumentStore>,
    policy: BackoffPolicy,
    views: DashMap<ViewKey, ViewEntry>,
    next_consumer: AtomicU64,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, policy: BackoffPolicy) -> Self {
        Self {
            store,
            policy,
            views: DashMap::new(),
            next_consumer: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Register `callback` on the view named by `key`, attaching a listener
    /// built from `source` if none is active.
    ///
    /// The callback receives the current snapshot right away when the view
    /// already has one. A view that previously exhausted its reconnect
    /// attempts is replaced by a fresh one.
    pub fn subscribe<T, F>(
        self: &Arc<Self>,
        key: ViewKey,
        source: ViewSource<T>,
        callback: F,
    ) -> ServiceResult<Subscription>
    where
        T: Send + Sync + 'static,
        F: Fn(ViewEvent<T>) + Send + 'static,
    {
        let consumer = self.next_consumer.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        // Registration happens under the map entry lock so a concurrent last
        // release cannot tear the view down in between
        let view = match self.views.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get().state.borrow() == SyncState::Failed {
                    let stale = occupied.get().downcast::<T>(&key)?;
                    stale.shutdown();
                    let view = self.spawn_view(key.clone(), source);
                    view.register(consumer, tx);
                    occupied.insert(ViewEntry::new(&view));
                    tracing::info!(view = %key, "Replaced failed live view");
                    view
                } else {
                    let view = occupied.get().downcast::<T>(&key)?;
                    view.register(consumer, tx);
                    view
                }
            }
            Entry::Vacant(vacant) => {
                let view = self.spawn_view(key.clone(), source);
                view.register(consumer, tx);
                vacant.insert(ViewEntry::new(&view));
                tracing::info!(view = %key, "Live view attached");
                view
            }
        };

        let coordinator = Arc::clone(self);
        let release = move || coordinator.release(&view, consumer);
        Ok(Subscription::start(key, rx, callback, release))
    }

    fn spawn_view<T: Send + Sync + 'static>(
        &self,
        key: ViewKey,
        source: ViewSource<T>,
    ) -> Arc<LiveView<T>> {
        let view = LiveView::new(key);
        view.start(Arc::clone(&self.store), source, self.policy.clone());
        view
    }

    fn release<T: Send + Sync + 'static>(&self, view: &Arc<LiveView<T>>, consumer: u64) {
        if view.unregister(consumer) > 0 {
            return;
        }

        let removed = self
            .views
            .remove_if(view.key(), |_, entry| entry.holds(view) && view.consumer_count() == 0);

        if removed.is_some() {
            view.shutdown();
            tracing::info!(view = %view.key(), "Live view detached");
        } else if !self.is_registered(view) {
            // Superseded by a replacement; nothing else references it
            view.shutdown();
        }
    }

    fn is_registered<T: Send + Sync + 'static>(&self, view: &Arc<LiveView<T>>) -> bool {
        self.views
            .get(view.key())
            .is_some_and(|entry| entry.holds(view))
    }

    /// Connection state of a view, if one is active
    pub fn state(&self, key: &ViewKey) -> Option<SyncState> {
        self.views.get(key).map(|entry| *entry.state.borrow())
    }

    /// Number of views with an attached (or reconnecting) listener
    pub fn active_views(&self) -> usize {
        self.views.len()
    }

    pub fn is_active(&self, key: &ViewKey) -> bool {
        self.views.contains_key(key)
    }
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("policy", &self.policy)
            .field("active_views", &self.views.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use social_core::{CollectionPath, Document, Fields, Query};
    use social_store::MemoryStore;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryStore>, Arc<SyncCoordinator>) {
        let store = Arc::new(MemoryStore::new(1));
        let policy = BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(20), 3);
        let coordinator = Arc::new(SyncCoordinator::new(store.clone(), policy));
        (store, coordinator)
    }

    fn count_source() -> ViewSource<usize> {
        ViewSource::new(CollectionPath::new("/c"), Query::new(), |docs: &[Document]| {
            docs.len()
        })
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_shared_listener_is_reference_counted() {
        let (store, coordinator) = setup();

        let a = coordinator
            .subscribe(ViewKey::Feed, count_source(), |_| {})
            .unwrap();
        let b = coordinator
            .subscribe(ViewKey::Feed, count_source(), |_| {})
            .unwrap();

        eventually(|| store.active_watches() == 1).await;
        assert_eq!(coordinator.active_views(), 1);

        a.cancel();
        assert!(coordinator.is_active(&ViewKey::Feed));

        b.cancel();
        assert!(!coordinator.is_active(&ViewKey::Feed));
        eventually(|| store.active_watches() == 0).await;
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_current_snapshot() {
        let (store, coordinator) = setup();
        let path = CollectionPath::new("/c");
        store.insert(&path, Fields::new()).await.unwrap();

        let _first = coordinator
            .subscribe(ViewKey::Feed, count_source(), |_| {})
            .unwrap();
        eventually(|| coordinator.state(&ViewKey::Feed) == Some(SyncState::Live)).await;

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let _second = coordinator
            .subscribe(ViewKey::Feed, count_source(), move |event| {
                if let ViewEvent::Snapshot(n) = event {
                    counter.store(*n, Ordering::SeqCst);
                }
            })
            .unwrap();

        eventually(|| seen.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn test_mismatched_snapshot_type_is_rejected() {
        let (_store, coordinator) = setup();
        let _sub = coordinator
            .subscribe(ViewKey::Feed, count_source(), |_| {})
            .unwrap();

        let other = ViewSource::new(CollectionPath::new("/c"), Query::new(), |_: &[Document]| {
            String::new()
        });
        let err = coordinator
            .subscribe(ViewKey::Feed, other, |_| {})
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[tokio::test]
    async fn test_view_fails_after_exhausting_attempts_and_is_replaced() {
        let (store, coordinator) = setup();
        store.disconnect();

        let failed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failed);
        let _sub = coordinator
            .subscribe(ViewKey::Feed, count_source(), move |event| {
                if let ViewEvent::Failed { attempts, .. } = event {
                    counter.store(attempts as usize, Ordering::SeqCst);
                }
            })
            .unwrap();

        eventually(|| coordinator.state(&ViewKey::Feed) == Some(SyncState::Failed)).await;
        eventually(|| failed.load(Ordering::SeqCst) == 3).await;

        store.reconnect();
        let _retry = coordinator
            .subscribe(ViewKey::Feed, count_source(), |_| {})
            .unwrap();
        eventually(|| coordinator.state(&ViewKey::Feed) == Some(SyncState::Live)).await;
    }

    #[tokio::test]
    async fn test_cancelling_superseded_view_keeps_replacement() {
        let (store, coordinator) = setup();
        store.disconnect();

        let old = coordinator
            .subscribe(ViewKey::Feed, count_source(), |_| {})
            .unwrap();
        eventually(|| coordinator.state(&ViewKey::Feed) == Some(SyncState::Failed)).await;

        store.reconnect();
        let _replacement = coordinator
            .subscribe(ViewKey::Feed, count_source(), |_| {})
            .unwrap();
        eventually(|| coordinator.state(&ViewKey::Feed) == Some(SyncState::Live)).await;

        old.cancel();
        assert!(coordinator.is_active(&ViewKey::Feed));
        assert_eq!(coordinator.state(&ViewKey::Feed), Some(SyncState::Live));
        assert_eq!(store.active_watches(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_reconnect_backoff_stops_everything() {
        let store = Arc::new(MemoryStore::new(1));
        let policy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_millis(200), 10);
        let coordinator = Arc::new(SyncCoordinator::new(store.clone(), policy));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = coordinator
            .subscribe(ViewKey::Feed, count_source(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        eventually(|| calls.load(Ordering::SeqCst) == 1).await;

        // Snapshot, then stale once the listener drops
        store.disconnect();
        eventually(|| calls.load(Ordering::SeqCst) == 2).await;
        assert_ne!(coordinator.state(&ViewKey::Feed), Some(SyncState::Live));

        sub.cancel();
        store.reconnect();
        store.insert(&CollectionPath::new("/c"), Fields::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.active_watches(), 0);
        assert_eq!(coordinator.active_views(), 0);
    }
}
