//! Session facade - the repositories bound to the signed-in user

use social_core::{DocumentId, IdentityProvider, Message, Post, UserId};

use super::context::ServiceContext;
use super::dm::ThreadSnapshot;
use super::error::ServiceResult;
use super::feed::FeedSnapshot;
use super::graph::FollowingSnapshot;
use crate::sync::{Subscription, ViewEvent};

/// Acts as whoever the identity provider reports. Every call resolves the
/// identity afresh and fails with `Unauthenticated` when nobody is signed in.
pub struct SocialSession<'a> {
    ctx: &'a ServiceContext,
    identity: &'a dyn IdentityProvider,
}

impl<'a> SocialSession<'a> {
    pub fn new(ctx: &'a ServiceContext, identity: &'a dyn IdentityProvider) -> Self {
        Self { ctx, identity }
    }

    /// Id of the signed-in user
    pub fn user_id(&self) -> ServiceResult<UserId> {
        Ok(self.identity.current_user_id()?)
    }

    pub async fn post(&self, text: &str) -> ServiceResult<Post> {
        let me = self.user_id()?;
        self.ctx.feed().create_post(&me, text).await
    }

    pub async fn delete(&self, post_id: &DocumentId) -> ServiceResult<()> {
        let me = self.user_id()?;
        self.ctx.feed().delete_post(&me, post_id).await
    }

    /// Toggle the current user's like on a post
    pub async fn like(&self, post_id: &DocumentId) -> ServiceResult<Post> {
        let me = self.user_id()?;
        self.ctx.feed().toggle_like(&me, post_id).await
    }

    pub async fn follow(&self, user_id: &UserId) -> ServiceResult<()> {
        let me = self.user_id()?;
        self.ctx.graph().follow(&me, user_id).await
    }

    pub async fn unfollow(&self, user_id: &UserId) -> ServiceResult<()> {
        let me = self.user_id()?;
        self.ctx.graph().unfollow(&me, user_id).await
    }

    pub async fn is_following(&self, user_id: &UserId) -> ServiceResult<bool> {
        let me = self.user_id()?;
        self.ctx.graph().is_following(&me, user_id).await
    }

    pub async fn message(&self, recipient_id: &UserId, text: &str) -> ServiceResult<Message> {
        let me = self.user_id()?;
        self.ctx.messages().send_message(&me, recipient_id, text).await
    }

    /// Live public feed
    pub fn feed<F>(&self, callback: F) -> ServiceResult<Subscription>
    where
        F: Fn(ViewEvent<FeedSnapshot>) + Send + 'static,
    {
        self.user_id()?;
        self.ctx.feed().subscribe_feed(callback)
    }

    /// Live set of users the current user follows
    pub fn following<F>(&self, callback: F) -> ServiceResult<Subscription>
    where
        F: Fn(ViewEvent<FollowingSnapshot>) + Send + 'static,
    {
        let me = self.user_id()?;
        self.ctx.graph().subscribe_following(&me, callback)
    }

    /// Live conversation with `other`
    pub fn thread<F>(&self, other: &UserId, callback: F) -> ServiceResult<Subscription>
    where
        F: Fn(ViewEvent<ThreadSnapshot>) + Send + 'static,
    {
        let me = self.user_id()?;
        self.ctx.messages().subscribe_thread(&me, other, callback)
    }
}
