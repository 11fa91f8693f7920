//! Traits (ports) - the collaborators the domain consumes

mod identity;
mod store;

pub use identity::{IdentityProvider, StaticIdentity};
pub use store::{
    CollectionPath, Direction, Document, DocumentStore, FieldOp, Fields, Filter, ListenerHandle,
    OrderBy, OrderKey, Patch, Query, Snapshot, StoreResult, Watch,
};
