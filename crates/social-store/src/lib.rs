//! # social-store
//!
//! In-process implementation of the [`DocumentStore`] contract.
//!
//! ## Features
//!
//! - **Collections**: documents keyed by id under slash-separated paths
//! - **Server metadata**: store-assigned ids, creation/update times and a
//!   global revision counter
//! - **Live watches**: full snapshots pushed to every listener after each
//!   write to its collection, in revision order
//! - **Fault injection**: simulated connection loss and write latency, for
//!   exercising reconnect and timeout paths
//!
//! ## Example
//!
//! ```ignore
//! use social_core::{CollectionPath, DocumentStore, Query};
//! use social_store::MemoryStore;
//!
//! let store = MemoryStore::new(0);
//! let posts = CollectionPath::new("/artifacts/app/public/data/posts");
//! let mut watch = store.watch(&posts, Query::new()).await?;
//! store.insert(&posts, fields).await?;
//! store.disconnect(); // every watch now ends with a transport error
//! ```
//!
//! [`DocumentStore`]: social_core::DocumentStore

mod memory;

pub use memory::MemoryStore;
