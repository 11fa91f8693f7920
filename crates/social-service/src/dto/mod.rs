//! Data transfer objects between the store and the domain
//!
//! This module provides:
//! - Record types for each stored document body
//! - Projections that turn raw snapshots into ordered entity lists

pub mod records;

pub use records::{FollowRecord, MessageRecord, PostRecord};
