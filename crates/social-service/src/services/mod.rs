//! Repositories and their shared context
//!
//! This module contains the feed, social graph and direct message
//! repositories, the context they borrow and the session facade.

pub mod context;
pub mod dm;
pub mod error;
pub mod feed;
pub mod graph;
pub mod paths;
pub mod session;

// Re-export all repositories for convenience
pub use context::{ServiceContext, ServiceContextBuilder, ServiceSettings};
pub use dm::{DirectMessageRepository, ThreadSnapshot};
pub use error::{ServiceError, ServiceResult};
pub use feed::{FeedRepository, FeedSnapshot};
pub use graph::{FollowingSnapshot, SocialGraphRepository};
pub use paths::CollectionPaths;
pub use session::SocialSession;
