//! Error types for the domain layer and store connectors

mod domain_error;
mod store_error;

pub use domain_error::DomainError;
pub use store_error::StoreError;
