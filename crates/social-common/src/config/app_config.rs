//! Application configuration structs
//!
//! Loaded once at startup from environment variables (and a `.env` file if
//! present), then validated. Nothing reads configuration from globals after
//! that; the struct is passed to whoever needs it.

use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub store: StoreConfig,
    pub feed: FeedConfig,
    pub sync: SyncConfig,
    pub auth: AuthConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    /// Tenant namespace for every collection path
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Document store connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Connector-specific options, interpreted by the connector
    #[serde(default)]
    pub options: serde_json::Map<String, Value>,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Worker id for store-assigned document ids
    #[serde(default)]
    pub worker_id: u16,
}

impl StoreConfig {
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Content limits
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_max_post_length")]
    pub max_post_length: usize,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

/// Live view reconnection policy
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl SyncConfig {
    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    #[must_use]
    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

/// Identity settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Opaque token identifying the signed-in user, if any
    #[serde(default)]
    pub initial_auth_token: Option<String>,
}

// Default value functions
fn default_app_id() -> String {
    "default-app-id".to_string()
}

fn default_write_timeout_ms() -> u64 {
    5_000
}

fn default_max_post_length() -> usize {
    500
}

fn default_max_message_length() -> usize {
    2_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            options: serde_json::Map::new(),
            write_timeout_ms: default_write_timeout_ms(),
            worker_id: 0,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_post_length: default_max_post_length(),
            max_message_length: default_max_message_length(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings {
                app_id: default_app_id(),
                env: Environment::default(),
            },
            store: StoreConfig::default(),
            feed: FeedConfig::default(),
            sync: SyncConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is malformed or the result fails validation
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("APP_ENV").map(|s| s.to_lowercase()) {
            None => Environment::default(),
            Some(s) => match s.as_str() {
                "production" => Environment::Production,
                "staging" => Environment::Staging,
                "development" => Environment::Development,
                _ => return Err(ConfigError::InvalidValue("APP_ENV", s)),
            },
        };

        let options = match lookup("STORE_CONFIG") {
            None => serde_json::Map::new(),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ConfigError::InvalidValue(
                        "STORE_CONFIG",
                        "expected a JSON object".to_string(),
                    ))
                }
                Err(e) => return Err(ConfigError::InvalidValue("STORE_CONFIG", e.to_string())),
            },
        };

        let config = Self {
            app: AppSettings {
                app_id: lookup("APP_ID").unwrap_or_else(default_app_id),
                env,
            },
            store: StoreConfig {
                options,
                write_timeout_ms: parse_var(&lookup, "STORE_WRITE_TIMEOUT_MS", default_write_timeout_ms)?,
                worker_id: parse_var(&lookup, "WORKER_ID", || 0)?,
            },
            feed: FeedConfig {
                max_post_length: parse_var(&lookup, "FEED_MAX_POST_LENGTH", default_max_post_length)?,
                max_message_length: parse_var(
                    &lookup,
                    "FEED_MAX_MESSAGE_LENGTH",
                    default_max_message_length,
                )?,
            },
            sync: SyncConfig {
                backoff_base_ms: parse_var(&lookup, "SYNC_BACKOFF_BASE_MS", default_backoff_base_ms)?,
                backoff_cap_ms: parse_var(&lookup, "SYNC_BACKOFF_CAP_MS", default_backoff_cap_ms)?,
                max_reconnect_attempts: parse_var(
                    &lookup,
                    "SYNC_MAX_RECONNECT_ATTEMPTS",
                    default_max_reconnect_attempts,
                )?,
            },
            auth: AuthConfig {
                initial_auth_token: lookup("INITIAL_AUTH_TOKEN").filter(|t| !t.is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let app_id = &self.app.app_id;
        if app_id.trim().is_empty() || app_id.contains('/') {
            return Err(ConfigError::InvalidValue("APP_ID", app_id.clone()));
        }
        if self.store.write_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("STORE_WRITE_TIMEOUT_MS", "0".to_string()));
        }
        if self.store.worker_id >= 1024 {
            return Err(ConfigError::InvalidValue(
                "WORKER_ID",
                self.store.worker_id.to_string(),
            ));
        }
        if self.feed.max_post_length == 0 {
            return Err(ConfigError::InvalidValue("FEED_MAX_POST_LENGTH", "0".to_string()));
        }
        if self.feed.max_message_length == 0 {
            return Err(ConfigError::InvalidValue("FEED_MAX_MESSAGE_LENGTH", "0".to_string()));
        }
        if self.sync.backoff_base_ms == 0 || self.sync.backoff_base_ms > self.sync.backoff_cap_ms {
            return Err(ConfigError::InvalidValue(
                "SYNC_BACKOFF_BASE_MS",
                format!(
                    "{} (cap is {})",
                    self.sync.backoff_base_ms, self.sync.backoff_cap_ms
                ),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T, D>(lookup: &F, key: &'static str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    D: FnOnce() -> T,
{
    match lookup(key) {
        None => Ok(default()),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
