//! Text content rules shared by posts and direct messages

use crate::error::DomainError;

/// Check user-supplied text: non-blank and at most `max` characters
pub fn validate_content(text: &str, max: usize) -> Result<(), DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::EmptyContent);
    }
    if text.chars().count() > max {
        return Err(DomainError::ContentTooLong { max });
    }
    Ok(())
}
