//! Social graph repository
//!
//! Directed follow edges stored under the follower, keyed by followee id,
//! so at most one edge exists per ordered pair.

use social_core::{Direction, DocumentId, FollowEdge, OrderKey, Query, UserId};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

use super::context::ServiceContext;
use super::error::ServiceResult;
use crate::dto::records::{self, FollowRecord};
use crate::sync::{Subscription, ViewEvent, ViewKey, ViewSource};

/// Snapshot type of a following view: the ids a user follows
pub type FollowingSnapshot = BTreeSet<UserId>;

/// Social graph repository
pub struct SocialGraphRepository<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> SocialGraphRepository<'a> {
    /// Create a new SocialGraphRepository
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create the edge `follower -> followee`. Following twice is a no-op.
    #[instrument(skip(self))]
    pub async fn follow(&self, follower_id: &UserId, followee_id: &UserId) -> ServiceResult<()> {
        FollowEdge::check(follower_id, followee_id)?;

        let created = self
            .ctx
            .write("follow", self.add_edge(follower_id, followee_id))
            .await?;

        if created {
            info!(follower_id = %follower_id, followee_id = %followee_id, "Followed");
        } else {
            debug!(follower_id = %follower_id, followee_id = %followee_id, "Already following");
        }
        Ok(())
    }

    /// Remove the edge `follower -> followee`. Removing a missing edge is a no-op.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, follower_id: &UserId, followee_id: &UserId) -> ServiceResult<()> {
        let removed = self
            .ctx
            .write("unfollow", self.remove_edge(follower_id, followee_id))
            .await?;

        if removed {
            info!(follower_id = %follower_id, followee_id = %followee_id, "Unfollowed");
        } else {
            debug!(follower_id = %follower_id, followee_id = %followee_id, "Not following");
        }
        Ok(())
    }

    async fn add_edge(&self, follower_id: &UserId, followee_id: &UserId) -> ServiceResult<bool> {
        if self.is_following(follower_id, followee_id).await? {
            return Ok(false);
        }

        let record = FollowRecord {
            follower_id: follower_id.clone(),
            followee_id: followee_id.clone(),
        };
        let fields = records::to_fields(&record)?;
        let path = self.ctx.paths().following(follower_id);
        self.ctx
            .store()
            .set(&path, &edge_id(followee_id), fields)
            .await?;
        Ok(true)
    }

    async fn remove_edge(&self, follower_id: &UserId, followee_id: &UserId) -> ServiceResult<bool> {
        if !self.is_following(follower_id, followee_id).await? {
            return Ok(false);
        }

        let path = self.ctx.paths().following(follower_id);
        self.ctx.store().delete(&path, &edge_id(followee_id)).await?;
        Ok(true)
    }

    /// Check if the edge `follower -> followee` exists
    pub async fn is_following(&self, follower_id: &UserId, followee_id: &UserId) -> ServiceResult<bool> {
        let path = self.ctx.paths().following(follower_id);
        let doc = self.ctx.store().get(&path, &edge_id(followee_id)).await?;
        Ok(doc.is_some())
    }

    /// One-shot read of everyone `user_id` follows
    pub async fn following(&self, user_id: &UserId) -> ServiceResult<FollowingSnapshot> {
        let path = self.ctx.paths().following(user_id);
        let docs = self.ctx.store().list(&path, &following_query()).await?;
        Ok(records::followees_from_documents(&docs))
    }

    /// Follow the set of users `user_id` follows, live
    pub fn subscribe_following<F>(&self, user_id: &UserId, callback: F) -> ServiceResult<Subscription>
    where
        F: Fn(ViewEvent<FollowingSnapshot>) + Send + 'static,
    {
        let source = ViewSource::new(
            self.ctx.paths().following(user_id),
            following_query(),
            records::followees_from_documents,
        );
        self.ctx
            .coordinator()
            .subscribe(ViewKey::Following(user_id.clone()), source, callback)
    }
}

fn edge_id(followee_id: &UserId) -> DocumentId {
    DocumentId::new(followee_id.as_str())
}

fn following_query() -> Query {
    Query::new().order_by(OrderKey::Id, Direction::Asc)
}
