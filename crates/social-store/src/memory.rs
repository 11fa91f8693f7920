//! Memory-backed document store.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use social_core::{
    CollectionPath, Document, DocumentId, DocumentStore, Fields, IdGenerator, ListenerHandle,
    Patch, Query, Snapshot, StoreError, StoreResult, Watch,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type SnapshotSender = mpsc::UnboundedSender<StoreResult<Snapshot>>;

/// Registered live listener
struct Watcher {
    path: CollectionPath,
    query: Query,
    tx: SnapshotSender,
}

#[derive(Default)]
struct StoreState {
    collections: HashMap<CollectionPath, BTreeMap<DocumentId, Document>>,
    /// Bumped on every write
    revision: u64,
    offline: bool,
    watchers: HashMap<u64, Watcher>,
    next_watcher: u64,
}

impl StoreState {
    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline {
            Err(StoreError::transport("store unreachable"))
        } else {
            Ok(())
        }
    }

    fn snapshot(&self, path: &CollectionPath, query: &Query) -> Snapshot {
        let documents = self
            .collections
            .get(path)
            .map(|docs| query.apply(docs.values()))
            .unwrap_or_default();
        Snapshot {
            revision: self.revision,
            documents,
        }
    }

    /// Push a fresh snapshot to every listener on `path`, pruning dead ones
    fn notify(&mut self, path: &CollectionPath) {
        let mut dead = Vec::new();
        for (id, watcher) in &self.watchers {
            if &watcher.path != path {
                continue;
            }
            let snapshot = self.snapshot(path, &watcher.query);
            if watcher.tx.send(Ok(snapshot)).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            self.watchers.remove(&id);
        }
    }
}

/// In-process document store.
///
/// All writes are serialized under one lock, so every listener observes
/// snapshots in strictly increasing revision order.
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    ids: IdGenerator,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store whose generated ids carry `worker_id`
    pub fn new(worker_id: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            ids: IdGenerator::new(worker_id),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Create a store from connector options.
    ///
    /// Recognized keys: `latencyMs`, a write delay in milliseconds. Other
    /// keys belong to remote connectors and are ignored.
    pub fn with_options(worker_id: u16, options: &serde_json::Map<String, Value>) -> Self {
        let store = Self::new(worker_id);
        for (key, value) in options {
            match (key.as_str(), value.as_u64()) {
                ("latencyMs", Some(ms)) => store.set_latency(Duration::from_millis(ms)),
                ("latencyMs", None) => warn!(value = %value, "Ignoring non-numeric latencyMs"),
                _ => debug!(option = %key, "Option not used by the memory store"),
            }
        }
        store
    }

    /// Simulate connection loss: every live watch ends with a transport
    /// error and further operations fail until [`reconnect`](Self::reconnect)
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        state.offline = true;
        let dropped = state.watchers.len();
        for (_, watcher) in state.watchers.drain() {
            let _ = watcher
                .tx
                .send(Err(StoreError::transport("connection lost")));
        }
        info!(dropped_watches = dropped, "Store disconnected");
    }

    /// Restore connectivity
    pub fn reconnect(&self) {
        self.state.lock().offline = false;
        info!("Store reconnected");
    }

    pub fn is_online(&self) -> bool {
        !self.state.lock().offline
    }

    /// Delay applied before every write
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Number of attached store-side listeners
    pub fn active_watches(&self) -> usize {
        self.state.lock().watchers.len()
    }

    /// Current global revision
    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn detach_watcher(state: &Weak<Mutex<StoreState>>, id: u64) {
        if let Some(state) = state.upgrade() {
            if state.lock().watchers.remove(&id).is_some() {
                debug!(watch_id = id, "Watch detached");
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &CollectionPath, id: &DocumentId) -> StoreResult<Option<Document>> {
        let state = self.state.lock();
        state.ensure_online()?;
        Ok(state
            .collections
            .get(path)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list(&self, path: &CollectionPath, query: &Query) -> StoreResult<Vec<Document>> {
        let state = self.state.lock();
        state.ensure_online()?;
        Ok(state.snapshot(path, query).documents)
    }

    async fn watch(&self, path: &CollectionPath, query: Query) -> StoreResult<Watch> {
        let mut state = self.state.lock();
        state.ensure_online()?;

        let (tx, rx) = mpsc::unbounded_channel();
        // initial snapshot goes out before any later write can interleave
        let _ = tx.send(Ok(state.snapshot(path, &query)));

        let id = state.next_watcher;
        state.next_watcher += 1;
        state.watchers.insert(
            id,
            Watcher {
                path: path.clone(),
                query,
                tx,
            },
        );
        debug!(watch_id = id, path = %path, "Watch attached");

        let weak = Arc::downgrade(&self.state);
        let handle = ListenerHandle::new(move || Self::detach_watcher(&weak, id));
        Ok(Watch::new(rx, handle))
    }

    async fn insert(&self, path: &CollectionPath, fields: Fields) -> StoreResult<DocumentId> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.ensure_online()?;

        let id = self.ids.generate();
        let now = Utc::now();
        state.revision += 1;
        let doc = Document {
            id: id.clone(),
            create_time: now,
            update_time: now,
            revision: state.revision,
            fields,
        };
        state
            .collections
            .entry(path.clone())
            .or_default()
            .insert(id.clone(), doc);
        state.notify(path);
        Ok(id)
    }

    async fn set(&self, path: &CollectionPath, id: &DocumentId, fields: Fields) -> StoreResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.ensure_online()?;

        let now = Utc::now();
        state.revision += 1;
        let revision = state.revision;
        let docs = state.collections.entry(path.clone()).or_default();
        let create_time = docs.get(id).map_or(now, |existing| existing.create_time);
        docs.insert(
            id.clone(),
            Document {
                id: id.clone(),
                create_time,
                update_time: now,
                revision,
                fields,
            },
        );
        state.notify(path);
        Ok(())
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &DocumentId,
        patch: Patch,
    ) -> StoreResult<Document> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.ensure_online()?;

        let revision = state.revision + 1;
        let doc = state
            .collections
            .get_mut(path)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(path.as_str(), id.as_str()))?;

        patch.apply(&mut doc.fields)?;
        doc.update_time = Utc::now();
        doc.revision = revision;
        let updated = doc.clone();

        state.revision = revision;
        state.notify(path);
        Ok(updated)
    }

    async fn delete(&self, path: &CollectionPath, id: &DocumentId) -> StoreResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock();
        state.ensure_online()?;

        let removed = state
            .collections
            .get_mut(path)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            state.revision += 1;
            state.notify(path);
        }
        Ok(())
    }
}
