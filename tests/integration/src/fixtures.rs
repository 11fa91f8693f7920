//! Test fixtures and data generators
//!
//! Provides reusable identities and configuration for integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use social_common::AppConfig;
use social_core::{StaticIdentity, UserId};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A user id that no other test uses
pub fn unique_user(prefix: &str) -> UserId {
    let suffix = unique_suffix();
    UserId::parse(format!("{prefix}{suffix}")).expect("generated user id is valid")
}

/// A signed-in identity for a fresh user
pub fn signed_in(prefix: &str) -> StaticIdentity {
    StaticIdentity::new(unique_user(prefix))
}

/// Configuration with millisecond-scale reconnect backoff
pub fn test_config() -> Result<AppConfig> {
    config_with(&[])
}

/// [`test_config`] with additional variable overrides
pub fn config_with(overrides: &[(&str, &str)]) -> Result<AppConfig> {
    let mut vars: HashMap<String, String> = [
        ("APP_ID", "integration-app"),
        ("SYNC_BACKOFF_BASE_MS", "5"),
        ("SYNC_BACKOFF_CAP_MS", "40"),
        ("SYNC_MAX_RECONNECT_ATTEMPTS", "8"),
        ("STORE_WRITE_TIMEOUT_MS", "1000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }

    Ok(AppConfig::from_lookup(|key| vars.get(key).cloned())?)
}
