//! Live view synchronization
//!
//! The coordinator keeps at most one store listener per distinct view and
//! fans its snapshots out to every subscriber of that view. Listeners are
//! reference counted: the first subscriber attaches one, the last
//! cancellation detaches it. Connection loss is absorbed here; subscribers
//! see the last good snapshot flagged stale until the view reconnects.

mod backoff;
mod coordinator;
mod subscription;
mod view;

pub use backoff::BackoffPolicy;
pub use coordinator::SyncCoordinator;
pub use subscription::Subscription;
pub use view::ViewSource;

use social_core::{ThreadKey, UserId};
use std::fmt;
use std::sync::Arc;

/// Identity of a live view; subscribers with equal keys share one listener
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    Feed,
    Following(UserId),
    Thread(ThreadKey),
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feed => f.write_str("feed"),
            Self::Following(user) => write!(f, "following:{user}"),
            Self::Thread(key) => write!(f, "thread:{key}"),
        }
    }
}

/// Connection state of a live view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Connecting,
    Live,
    /// Reconnect attempts exhausted; the view no longer updates
    Failed,
}

/// What a subscriber callback receives
#[derive(Debug)]
pub enum ViewEvent<T> {
    /// Fresh snapshot from a live listener
    Snapshot(Arc<T>),
    /// Connection lost; the last good snapshot, no longer current
    Stale(Arc<T>),
    /// Reconnect attempts exhausted
    Failed { last: Option<Arc<T>>, attempts: u32 },
}

impl<T> Clone for ViewEvent<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Snapshot(data) => Self::Snapshot(Arc::clone(data)),
            Self::Stale(data) => Self::Stale(Arc::clone(data)),
            Self::Failed { last, attempts } => Self::Failed {
                last: last.clone(),
                attempts: *attempts,
            },
        }
    }
}

impl<T> ViewEvent<T> {
    /// The snapshot carried by this event, if any
    pub fn data(&self) -> Option<&Arc<T>> {
        match self {
            Self::Snapshot(data) | Self::Stale(data) => Some(data),
            Self::Failed { last, .. } => last.as_ref(),
        }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
