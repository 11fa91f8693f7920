//! Value objects - immutable types that represent domain concepts

mod document_id;
mod user_id;

pub use document_id::{DocumentId, IdGenerator};
pub use user_id::UserId;
