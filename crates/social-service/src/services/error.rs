//! Service layer error types
//!
//! Every failure a caller can observe collapses into one of the variants
//! below. Transport errors on live views never reach here; the sync
//! coordinator absorbs them.

use social_core::{DomainError, StoreError};
use std::fmt;
use std::time::Duration;

/// Service layer error type
#[derive(Debug)]
pub enum ServiceError {
    /// Malformed input; never retried automatically
    Validation(String),

    /// Authorization failure
    PermissionDenied(String),

    /// Referenced entity absent
    NotFound { resource: &'static str, id: String },

    /// No response within the write deadline; the caller may retry
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Connectivity lost during a one-shot operation
    Transport(String),

    /// No signed-in user
    Unauthenticated,

    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::PermissionDenied(msg) => write!(f, "Permission denied: {msg}"),
            Self::NotFound { resource, id } => write!(f, "{resource} not found: {id}"),
            Self::Timeout { operation, after } => {
                write!(f, "{operation} timed out after {}ms", after.as_millis())
            }
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
            Self::Unauthenticated => write!(f, "Not authenticated"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport(_))
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::PostNotFound(id) => Self::not_found("Post", id.to_string()),
            DomainError::Unauthenticated => Self::Unauthenticated,
            e if e.is_authorization() => Self::PermissionDenied(e.to_string()),
            e if e.is_validation() => Self::Validation(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { path, id } => Self::not_found("Document", format!("{path}/{id}")),
            e if e.is_transport() => Self::Transport(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
