//! Test helpers for integration tests
//!
//! Provides a wired service stack over an in-process store, a recorder for
//! live view events and polling utilities.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use social_common::AppConfig;
use social_core::IdentityProvider;
use social_service::{ServiceContext, SocialSession, ViewEvent};
use social_store::MemoryStore;

use crate::fixtures::test_config;

/// How long polling helpers wait before giving up
pub const WAIT_LIMIT: Duration = Duration::from_secs(3);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Service stack over a fresh in-process store
pub struct TestNode {
    pub store: Arc<MemoryStore>,
    pub ctx: ServiceContext,
}

impl TestNode {
    /// Start a node with the default test configuration
    pub fn start() -> Result<Self> {
        Ok(Self::start_with_config(&test_config()?))
    }

    /// Start a node with custom config
    pub fn start_with_config(config: &AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new(config.store.worker_id));
        let ctx = ServiceContext::from_config(store.clone(), config);
        Self { store, ctx }
    }

    /// Act as `identity`
    pub fn session<'a>(&'a self, identity: &'a dyn IdentityProvider) -> SocialSession<'a> {
        SocialSession::new(&self.ctx, identity)
    }
}

/// Collects every event a subscription delivers
pub struct EventLog<T> {
    events: Arc<Mutex<Vec<ViewEvent<T>>>>,
}

impl<T> Clone for EventLog<T> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<T: Send + Sync + 'static> Default for EventLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> EventLog<T> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Callback that appends to this log
    pub fn recorder(&self) -> impl Fn(ViewEvent<T>) + Send + 'static {
        let events = Arc::clone(&self.events);
        move |event| events.lock().push(event)
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn events(&self) -> Vec<ViewEvent<T>> {
        self.events.lock().clone()
    }

    pub fn last(&self) -> Option<ViewEvent<T>> {
        self.events.lock().last().cloned()
    }

    /// Wait until the most recent event satisfies `check`
    pub async fn wait_for(&self, check: impl Fn(&ViewEvent<T>) -> bool) -> Result<ViewEvent<T>> {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        loop {
            if let Some(event) = self.last().filter(|e| check(e)) {
                return Ok(event);
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("no matching event within {WAIT_LIMIT:?}; saw {} events", self.len());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until the most recent event is a live snapshot satisfying `check`
    pub async fn wait_for_snapshot(&self, check: impl Fn(&T) -> bool) -> Result<Arc<T>> {
        let event = self
            .wait_for(|event| matches!(event, ViewEvent::Snapshot(data) if check(data)))
            .await?;
        match event {
            ViewEvent::Snapshot(data) => Ok(data),
            _ => bail!("unexpected event"),
        }
    }
}

/// Poll `check` until it holds
pub async fn eventually(mut check: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not reached within {WAIT_LIMIT:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(())
}
