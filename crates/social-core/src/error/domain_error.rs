//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::DocumentId;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Post not found: {0}")]
    PostNotFound(DocumentId),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Content must not be empty")]
    EmptyContent,

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Cannot follow yourself")]
    SelfFollow,

    #[error("Cannot send a direct message to yourself")]
    SelfMessage,

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not post author")]
    NotPostAuthor,

    #[error("No authenticated user")]
    Unauthenticated,
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::PostNotFound(_) => "UNKNOWN_POST",
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",
            Self::InvalidUserId(_) => "INVALID_USER_ID",
            Self::SelfFollow => "SELF_FOLLOW",
            Self::SelfMessage => "SELF_MESSAGE",
            Self::NotPostAuthor => "NOT_POST_AUTHOR",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PostNotFound(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyContent
                | Self::ContentTooLong { .. }
                | Self::InvalidUserId(_)
                | Self::SelfFollow
                | Self::SelfMessage
        )
    }

    /// Check if this is an authorization error
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::NotPostAuthor)
    }
}
