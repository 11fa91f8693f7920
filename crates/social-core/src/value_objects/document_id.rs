//! Document identifiers
//!
//! Store-assigned ids are snowflake-shaped 63-bit integers:
//! - Bits 62-22: Timestamp (milliseconds since custom epoch)
//! - Bits 21-12: Worker ID (0-1023)
//! - Bits 11-0:  Sequence number
//!
//! They are rendered as fixed-width decimal strings so that lexical order
//! equals numeric order. Caller-chosen ids (e.g. a followee's user id) are
//! arbitrary strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a document inside a collection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Custom epoch: 2024-01-01 00:00:00 UTC (milliseconds)
    pub const EPOCH: i64 = 1_704_067_200_000;

    /// Wrap an arbitrary id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Render a generated snowflake as a fixed-width id
    #[inline]
    pub fn from_raw(raw: i64) -> Self {
        Self(format!("{raw:019}"))
    }

    /// Parse back the snowflake value, if this id was store-generated
    pub fn raw(&self) -> Option<i64> {
        if self.0.len() == 19 {
            self.0.parse().ok()
        } else {
            None
        }
    }

    /// Milliseconds since the Unix epoch encoded in a generated id
    pub fn timestamp(&self) -> Option<i64> {
        self.raw().map(|raw| (raw >> 22) + Self::EPOCH)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lock-free, monotonic id generator for one store instance
pub struct IdGenerator {
    worker_id: u16,
    last: AtomicI64,
}

impl IdGenerator {
    /// Create a new generator with the given worker ID
    ///
    /// # Panics
    /// Panics if worker_id >= 1024
    pub fn new(worker_id: u16) -> Self {
        assert!(worker_id < 1024, "Worker ID must be < 1024");
        Self {
            worker_id,
            last: AtomicI64::new(0),
        }
    }

    /// Generate the next id. Ids from one generator are strictly increasing;
    /// bursts beyond the sequence space borrow from the next millisecond.
    pub fn generate(&self) -> DocumentId {
        let floor = ((Self::now_millis() - DocumentId::EPOCH) << 22) | (i64::from(self.worker_id) << 12);
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = if floor > last { floor } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return DocumentId::from_raw(next),
                Err(actual) => last = actual,
            }
        }
    }

    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    #[inline]
    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(DocumentId::EPOCH)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}
