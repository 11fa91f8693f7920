//! # social-service
//!
//! Application layer: the feed, social graph and direct message
//! repositories, and the sync coordinator that keeps their live views
//! attached to the document store.

pub mod dto;
pub mod services;
pub mod sync;

pub use services::{
    CollectionPaths, DirectMessageRepository, FeedRepository, FeedSnapshot, FollowingSnapshot,
    ServiceContext, ServiceContextBuilder, ServiceError, ServiceResult, ServiceSettings,
    SocialGraphRepository, SocialSession, ThreadSnapshot,
};
pub use sync::{BackoffPolicy, Subscription, SyncCoordinator, SyncState, ViewEvent, ViewKey, ViewSource};
