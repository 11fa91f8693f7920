//! Collection layout under the application namespace

use social_core::{CollectionPath, ThreadKey, UserId};

/// Resolves every collection the repositories touch.
///
/// ```text
/// /artifacts/{app_id}/public/data/posts
/// /artifacts/{app_id}/users/{user_id}/following
/// /artifacts/{app_id}/public/data/messages_thread/{thread_key}/messages
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPaths {
    root: CollectionPath,
}

impl CollectionPaths {
    pub fn new(app_id: &str) -> Self {
        Self {
            root: CollectionPath::new("/artifacts").join([app_id]),
        }
    }

    pub fn root(&self) -> &CollectionPath {
        &self.root
    }

    /// Public feed
    pub fn posts(&self) -> CollectionPath {
        self.root.join(["public", "data", "posts"])
    }

    /// Outgoing follow edges of `user_id`, keyed by followee id
    pub fn following(&self, user_id: &UserId) -> CollectionPath {
        self.root.join(["users", user_id.as_str(), "following"])
    }

    /// Messages of one conversation
    pub fn thread(&self, key: &ThreadKey) -> CollectionPath {
        self.root
            .join(["public", "data", "messages_thread", key.as_str(), "messages"])
    }
}
