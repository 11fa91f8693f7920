//! Feed repository
//!
//! Handles post creation, deletion, likes and the live public feed.

use social_core::entities::validate_content;
use social_core::{
    Direction, DocumentId, DomainError, Fields, OrderKey, Patch, Post, Query, StoreError, UserId,
};
use tracing::{info, instrument, warn};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use crate::dto::records::{self, PostRecord, LIKED_BY};
use crate::sync::{Subscription, ViewEvent, ViewKey, ViewSource};

/// Snapshot type of the feed view, newest post first
pub type FeedSnapshot = Vec<Post>;

/// Feed repository
pub struct FeedRepository<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> FeedRepository<'a> {
    /// Create a new FeedRepository
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Publish a post. Text is stored as given, not trimmed.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn create_post(&self, author_id: &UserId, text: &str) -> ServiceResult<Post> {
        validate_content(text, self.ctx.settings().max_post_length)?;

        let record = PostRecord {
            author_id: author_id.clone(),
            text: text.to_string(),
            liked_by: Vec::new(),
        };
        let fields = records::to_fields(&record)?;

        let post = self
            .ctx
            .write("create_post", self.insert_post(fields))
            .await?;

        info!(post_id = %post.id, author_id = %author_id, "Post created");
        Ok(post)
    }

    /// Delete a post; only its author may do so
    #[instrument(skip(self))]
    pub async fn delete_post(&self, requester_id: &UserId, post_id: &DocumentId) -> ServiceResult<()> {
        self.ctx
            .write("delete_post", self.remove_post(requester_id, post_id))
            .await?;

        info!(post_id = %post_id, "Post deleted");
        Ok(())
    }

    /// Add `user_id` to the post's likers, or remove them if already present.
    ///
    /// The change is a single atomic set-union or set-removal, so toggles by
    /// different users never overwrite one another. Two concurrent toggles
    /// by the same user both read the same state and apply the same change,
    /// so they count as one toggle rather than cancelling out.
    #[instrument(skip(self))]
    pub async fn toggle_like(&self, user_id: &UserId, post_id: &DocumentId) -> ServiceResult<Post> {
        let (post, liked) = self
            .ctx
            .write("toggle_like", self.apply_like(user_id, post_id))
            .await?;

        info!(post_id = %post_id, user_id = %user_id, liked, likes = post.like_count(), "Like toggled");
        Ok(post)
    }

    async fn insert_post(&self, fields: Fields) -> ServiceResult<Post> {
        let path = self.ctx.paths().posts();
        let post_id = self.ctx.store().insert(&path, fields).await?;
        self.get_post(&post_id).await
    }

    async fn remove_post(&self, requester_id: &UserId, post_id: &DocumentId) -> ServiceResult<()> {
        let post = self.get_post(post_id).await?;

        if !post.is_authored_by(requester_id) {
            warn!(post_id = %post_id, requester_id = %requester_id, "Delete rejected, not the author");
            return Err(DomainError::NotPostAuthor.into());
        }

        let path = self.ctx.paths().posts();
        self.ctx.store().delete(&path, post_id).await?;
        Ok(())
    }

    /// Returns the updated post and whether `user_id` now likes it
    async fn apply_like(&self, user_id: &UserId, post_id: &DocumentId) -> ServiceResult<(Post, bool)> {
        let liked = self.get_post(post_id).await?.is_liked_by(user_id);

        let patch = if liked {
            Patch::new().array_remove(LIKED_BY, user_id.as_str())
        } else {
            Patch::new().array_union(LIKED_BY, user_id.as_str())
        };

        let path = self.ctx.paths().posts();
        let doc = self
            .ctx
            .store()
            .update(&path, post_id, patch)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => ServiceError::from(DomainError::PostNotFound(post_id.clone())),
                e => ServiceError::from(e),
            })?;

        Ok((records::post_from_document(&doc)?, !liked))
    }

    /// Get a post by id
    pub async fn get_post(&self, post_id: &DocumentId) -> ServiceResult<Post> {
        let path = self.ctx.paths().posts();
        let doc = self
            .ctx
            .store()
            .get(&path, post_id)
            .await?
            .ok_or_else(|| DomainError::PostNotFound(post_id.clone()))?;

        Ok(records::post_from_document(&doc)?)
    }

    /// One-shot read of the whole feed, newest first
    pub async fn list_posts(&self) -> ServiceResult<FeedSnapshot> {
        let path = self.ctx.paths().posts();
        let docs = self.ctx.store().list(&path, &feed_query()).await?;
        Ok(records::posts_from_documents(&docs))
    }

    /// Follow the public feed live. Every subscriber shares one listener.
    pub fn subscribe_feed<F>(&self, callback: F) -> ServiceResult<Subscription>
    where
        F: Fn(ViewEvent<FeedSnapshot>) + Send + 'static,
    {
        let source = ViewSource::new(
            self.ctx.paths().posts(),
            feed_query(),
            records::posts_from_documents,
        );
        self.ctx
            .coordinator()
            .subscribe(ViewKey::Feed, source, callback)
    }
}

fn feed_query() -> Query {
    Query::new()
        .order_by(OrderKey::CreateTime, Direction::Desc)
        .order_by(OrderKey::Id, Direction::Desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use social_store::MemoryStore;
    use std::sync::Arc;

    fn ctx() -> ServiceContext {
        ServiceContext::builder()
            .store(Arc::new(MemoryStore::new(1)))
            .app_id("test-app")
            .build()
            .unwrap()
    }

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_post() {
        let ctx = ctx();
        let post = ctx.feed().create_post(&uid("alice"), "  hello  ").await.unwrap();
        assert_eq!(post.text, "  hello  ");
        assert_eq!(post.author_id, uid("alice"));
        assert!(post.liked_by.is_empty());

        let posts = ctx.feed().list_posts().await.unwrap();
        assert_eq!(posts, vec![post]);
    }

    #[tokio::test]
    async fn test_create_post_validation() {
        let ctx = ctx();
        let feed = ctx.feed();

        let err = feed.create_post(&uid("alice"), " \n\t").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let long = "x".repeat(501);
        let err = feed.create_post(&uid("alice"), &long).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        assert!(feed.create_post(&uid("alice"), &"x".repeat(500)).await.is_ok());
        assert_eq!(feed.list_posts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_posts_newest_first() {
        let ctx = ctx();
        let feed = ctx.feed();
        for text in ["one", "two", "three"] {
            feed.create_post(&uid("alice"), text).await.unwrap();
        }
        let texts: Vec<String> = feed.list_posts().await.unwrap().into_iter().map(|p| p.text).collect();
        assert_eq!(texts, ["three", "two", "one"]);
    }

    #[tokio::test]
    async fn test_toggle_like_twice_restores() {
        let ctx = ctx();
        let feed = ctx.feed();
        let post = feed.create_post(&uid("alice"), "hi").await.unwrap();

        let liked = feed.toggle_like(&uid("bob"), &post.id).await.unwrap();
        assert!(liked.is_liked_by(&uid("bob")));
        assert_eq!(liked.like_count(), 1);

        let unliked = feed.toggle_like(&uid("bob"), &post.id).await.unwrap();
        assert_eq!(unliked.liked_by, post.liked_by);
    }

    #[tokio::test]
    async fn test_toggle_like_missing_post() {
        let ctx = ctx();
        let err = ctx
            .feed()
            .toggle_like(&uid("bob"), &DocumentId::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { resource: "Post", .. }));
    }

    #[tokio::test]
    async fn test_delete_post_author_only() {
        let ctx = ctx();
        let feed = ctx.feed();
        let post = feed.create_post(&uid("alice"), "hi").await.unwrap();

        let err = feed.delete_post(&uid("bob"), &post.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
        assert!(feed.get_post(&post.id).await.is_ok());

        feed.delete_post(&uid("alice"), &post.id).await.unwrap();
        let err = feed.get_post(&post.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        let err = feed.delete_post(&uid("alice"), &post.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
