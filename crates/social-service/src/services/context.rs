//! Service context - dependency container for repositories
//!
//! Holds the store connector, collection layout, limits and the sync
//! coordinator shared by every repository.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use social_common::AppConfig;
use social_core::DocumentStore;

use super::dm::DirectMessageRepository;
use super::error::{ServiceError, ServiceResult};
use super::feed::FeedRepository;
use super::graph::SocialGraphRepository;
use super::paths::CollectionPaths;
use crate::sync::{BackoffPolicy, SyncCoordinator};

/// Limits applied by the repositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Maximum post length in characters
    pub max_post_length: usize,
    /// Maximum message length in characters
    pub max_message_length: usize,
    /// Deadline for every write; reads and live views have none
    pub write_timeout: Duration,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_post_length: config.feed.max_post_length,
            max_message_length: config.feed.max_message_length,
            write_timeout: config.store.write_timeout(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Service context containing all dependencies
///
/// Cheap to clone; every clone shares the same store and coordinator.
#[derive(Clone)]
pub struct ServiceContext {
    store: Arc<dyn DocumentStore>,
    paths: CollectionPaths,
    settings: ServiceSettings,
    coordinator: Arc<SyncCoordinator>,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        paths: CollectionPaths,
        settings: ServiceSettings,
        policy: BackoffPolicy,
    ) -> Self {
        let coordinator = Arc::new(SyncCoordinator::new(Arc::clone(&store), policy));
        Self {
            store,
            paths,
            settings,
            coordinator,
        }
    }

    /// Wire a context from loaded configuration
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        Self::new(
            store,
            CollectionPaths::new(&config.app.app_id),
            ServiceSettings::from_config(config),
            BackoffPolicy::from_config(&config.sync),
        )
    }

    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    // === Dependencies ===

    /// Get the document store connector
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn paths(&self) -> &CollectionPaths {
        &self.paths
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Get the sync coordinator owning every live view
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    // === Repositories ===

    pub fn feed(&self) -> FeedRepository<'_> {
        FeedRepository::new(self)
    }

    pub fn graph(&self) -> SocialGraphRepository<'_> {
        SocialGraphRepository::new(self)
    }

    pub fn messages(&self) -> DirectMessageRepository<'_> {
        DirectMessageRepository::new(self)
    }

    /// Run a write operation, reads included, under the configured deadline.
    ///
    /// On timeout the write may still land; callers observe it through
    /// their live views.
    pub(crate) async fn write<T, F>(&self, operation: &'static str, write: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        let deadline = self.settings.write_timeout;
        match tokio::time::timeout(deadline, write).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                    "Write timed out"
                );
                Err(ServiceError::Timeout {
                    operation,
                    after: deadline,
                })
            }
        }
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("store", &"dyn DocumentStore")
            .field("paths", &self.paths)
            .field("settings", &self.settings)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

/// Builder for creating ServiceContext with custom configuration
pub struct ServiceContextBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    app_id: Option<String>,
    settings: ServiceSettings,
    policy: BackoffPolicy,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            app_id: None,
            settings: ServiceSettings::default(),
            policy: BackoffPolicy::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.settings.write_timeout = timeout;
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if the store or app id is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        let store = self
            .store
            .ok_or_else(|| ServiceError::validation("store is required"))?;
        let app_id = self
            .app_id
            .ok_or_else(|| ServiceError::validation("app_id is required"))?;
        if app_id.is_empty() || app_id.contains('/') {
            return Err(ServiceError::validation("app_id must be a single path segment"));
        }

        Ok(ServiceContext::new(
            store,
            CollectionPaths::new(&app_id),
            self.settings,
            self.policy,
        ))
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
