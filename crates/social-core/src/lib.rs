//! # social-core
//!
//! Domain layer containing entities, value objects, the document store
//! connector contract and the identity provider contract.
//! This crate has no knowledge of any concrete store or transport.

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{FollowEdge, Message, Post, ThreadKey};
pub use error::{DomainError, StoreError};
pub use traits::{
    CollectionPath, Direction, Document, DocumentStore, FieldOp, Fields, Filter, IdentityProvider,
    ListenerHandle, OrderBy, OrderKey, Patch, Query, Snapshot, StaticIdentity, StoreResult, Watch,
};
pub use value_objects::{DocumentId, IdGenerator, UserId};
