//! Direct messages and the thread key shared by both participants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::value_objects::{DocumentId, UserId};

/// Order-independent identifier of a two-party conversation.
///
/// Encoded as `{len(lo)}_{lo}_{hi}` with `lo <= hi`; the length prefix keeps
/// the encoding injective even when ids contain `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadKey(String);

impl ThreadKey {
    /// Derive the key for a conversation between two users
    pub fn between(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}_{}_{}", lo.as_str().len(), lo, hi))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direct message entity, append-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: DocumentId,
    pub thread_key: ThreadKey,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub text: String,
    /// Assigned by the store on insert
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// Thread order: `sent_at` ascending, ties broken by id ascending
    pub fn thread_order(a: &Self, b: &Self) -> Ordering {
        a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id))
    }
}
