//! Domain entities - core business objects

mod content;
mod follow;
mod message;
mod post;

pub use content::validate_content;
pub use follow::FollowEdge;
pub use message::{Message, ThreadKey};
pub use post::Post;
