//! Follow edge - a directed follower -> followee relationship

use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::value_objects::UserId;

/// Directed follow relationship, unique per ordered pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl FollowEdge {
    /// Check the no-self-follow rule for a prospective edge
    pub fn check(follower_id: &UserId, followee_id: &UserId) -> Result<(), DomainError> {
        if follower_id == followee_id {
            return Err(DomainError::SelfFollow);
        }
        Ok(())
    }
}
