//! Post entity - a feed entry with its set of likers

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::value_objects::{DocumentId, UserId};

/// Post entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: DocumentId,
    pub author_id: UserId,
    pub text: String,
    /// Assigned by the store on insert
    pub created_at: DateTime<Utc>,
    pub liked_by: BTreeSet<UserId>,
}

impl Post {
    /// Check if the given user wrote this post
    #[inline]
    pub fn is_authored_by(&self, user_id: &UserId) -> bool {
        &self.author_id == user_id
    }

    #[inline]
    pub fn is_liked_by(&self, user_id: &UserId) -> bool {
        self.liked_by.contains(user_id)
    }

    #[inline]
    pub fn like_count(&self) -> usize {
        self.liked_by.len()
    }

    /// Feed order: newest `created_at` first, ties broken by id descending
    pub fn feed_order(a: &Self, b: &Self) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}
