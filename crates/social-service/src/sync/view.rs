//! A single live view: one store listener, its last snapshot and the
//! consumers it fans out to.

use futures_util::StreamExt;
use parking_lot::Mutex;
use social_core::{CollectionPath, Document, DocumentStore, Query};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{BackoffPolicy, SyncState, ViewEvent, ViewKey};

pub(crate) type EventSender<T> = mpsc::UnboundedSender<ViewEvent<T>>;

type Projector<T> = Arc<dyn Fn(&[Document]) -> T + Send + Sync>;

/// Where a view's data comes from and how raw documents become its snapshot
pub struct ViewSource<T> {
    path: CollectionPath,
    query: Query,
    project: Projector<T>,
}

impl<T> ViewSource<T> {
    pub fn new<F>(path: CollectionPath, query: Query, project: F) -> Self
    where
        F: Fn(&[Document]) -> T + Send + Sync + 'static,
    {
        Self {
            path,
            query,
            project: Arc::new(project),
        }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Turn a full result set into a snapshot
    pub fn project(&self, documents: &[Document]) -> T {
        (self.project)(documents)
    }
}

impl<T> Clone for ViewSource<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            query: self.query.clone(),
            project: Arc::clone(&self.project),
        }
    }
}

impl<T> fmt::Debug for ViewSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSource")
            .field("path", &self.path)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

struct ViewInner<T> {
    last: Option<Arc<T>>,
    stale: bool,
    failed_after: Option<u32>,
    consumers: HashMap<u64, EventSender<T>>,
}

impl<T> ViewInner<T> {
    /// Event that brings a newly registered consumer up to date
    fn current(&self) -> Option<ViewEvent<T>> {
        if let Some(attempts) = self.failed_after {
            return Some(ViewEvent::Failed {
                last: self.last.clone(),
                attempts,
            });
        }
        let last = Arc::clone(self.last.as_ref()?);
        Some(if self.stale {
            ViewEvent::Stale(last)
        } else {
            ViewEvent::Snapshot(last)
        })
    }

    fn broadcast(&mut self, event: &ViewEvent<T>) {
        self.consumers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

pub(crate) struct LiveView<T> {
    key: ViewKey,
    inner: Mutex<ViewInner<T>>,
    state: watch::Sender<SyncState>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> LiveView<T> {
    pub(crate) fn new(key: ViewKey) -> Arc<Self> {
        let (state, _) = watch::channel(SyncState::Disconnected);
        Arc::new(Self {
            key,
            inner: Mutex::new(ViewInner {
                last: None,
                stale: false,
                failed_after: None,
                consumers: HashMap::new(),
            }),
            state,
            driver: Mutex::new(None),
        })
    }

    pub(crate) fn key(&self) -> &ViewKey {
        &self.key
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Add a consumer; it immediately receives the current snapshot if any
    pub(crate) fn register(&self, id: u64, tx: EventSender<T>) {
        let mut inner = self.inner.lock();
        if let Some(event) = inner.current() {
            if tx.send(event).is_err() {
                return;
            }
        }
        inner.consumers.insert(id, tx);
    }

    /// Remove a consumer, returning how many remain
    pub(crate) fn unregister(&self, id: u64) -> usize {
        let mut inner = self.inner.lock();
        inner.consumers.remove(&id);
        inner.consumers.len()
    }

    pub(crate) fn consumer_count(&self) -> usize {
        self.inner.lock().consumers.len()
    }

    /// Spawn the listener task
    pub(crate) fn start(
        self: &Arc<Self>,
        store: Arc<dyn DocumentStore>,
        source: ViewSource<T>,
        policy: BackoffPolicy,
    ) {
        let handle = tokio::spawn(Self::listener_loop(Arc::clone(self), store, source, policy));
        *self.driver.lock() = Some(handle);
    }

    /// Stop the listener task; its store listener is detached as the task
    /// is dropped
    pub(crate) fn shutdown(&self) {
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
        self.inner.lock().consumers.clear();
        self.state.send_replace(SyncState::Disconnected);
    }

    /// Attach, stream and re-attach until cancelled or out of attempts
    async fn listener_loop(
        self: Arc<Self>,
        store: Arc<dyn DocumentStore>,
        source: ViewSource<T>,
        policy: BackoffPolicy,
    ) {
        let mut attempts: u32 = 0;
        let mut last_revision: Option<u64> = None;

        loop {
            self.state.send_replace(SyncState::Connecting);

            match store.watch(source.path(), source.query().clone()).await {
                Ok(mut watch) => {
                    tracing::debug!(view = %self.key, path = %source.path(), "Listener attached");
                    let mut fresh = true;

                    loop {
                        match watch.next().await {
                            Some(Ok(snapshot)) => {
                                // The first snapshot after attaching is always current
                                if !fresh && last_revision.is_some_and(|r| snapshot.revision <= r) {
                                    tracing::trace!(
                                        view = %self.key,
                                        revision = snapshot.revision,
                                        "Dropping superseded snapshot"
                                    );
                                    continue;
                                }
                                fresh = false;
                                attempts = 0;
                                last_revision = Some(snapshot.revision);
                                self.publish(Arc::new(source.project(&snapshot.documents)));
                            }
                            Some(Err(e)) => {
                                tracing::warn!(view = %self.key, error = %e, "Listener lost");
                                break;
                            }
                            None => {
                                tracing::warn!(view = %self.key, "Listener stream ended");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        view = %self.key,
                        attempt = attempts,
                        error = %e,
                        "Failed to attach listener"
                    );
                }
            }

            self.mark_disconnected();

            if policy.is_exhausted(attempts) {
                tracing::error!(view = %self.key, attempts, "Reconnect attempts exhausted");
                self.fail(attempts);
                return;
            }

            attempts += 1;
            let delay = policy.delay(attempts);
            tracing::info!(
                view = %self.key,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting live view"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn publish(&self, data: Arc<T>) {
        let mut inner = self.inner.lock();
        self.state.send_replace(SyncState::Live);
        inner.last = Some(Arc::clone(&data));
        inner.stale = false;
        inner.broadcast(&ViewEvent::Snapshot(data));
    }

    /// Flag the last snapshot stale, once per outage
    fn mark_disconnected(&self) {
        let mut inner = self.inner.lock();
        self.state.send_replace(SyncState::Disconnected);
        if inner.stale {
            return;
        }
        if let Some(last) = inner.last.clone() {
            inner.stale = true;
            inner.broadcast(&ViewEvent::Stale(last));
        }
    }

    fn fail(&self, attempts: u32) {
        let mut inner = self.inner.lock();
        self.state.send_replace(SyncState::Failed);
        inner.failed_after = Some(attempts);
        let event = ViewEvent::Failed {
            last: inner.last.clone(),
            attempts,
        };
        inner.broadcast(&event);
    }
}
