//! Integration test utilities for the social feed
//!
//! This crate provides helpers for running end-to-end scenarios against
//! the repositories and live views over an in-process store.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
