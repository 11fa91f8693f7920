//! Identity provider contract

use crate::error::DomainError;
use crate::value_objects::UserId;

/// Supplies the stable user id of the current session
pub trait IdentityProvider: Send + Sync {
    /// Returns `DomainError::Unauthenticated` when no user is signed in
    fn current_user_id(&self) -> Result<UserId, DomainError>;
}

/// Identity fixed at startup, e.g. from an initial auth token
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<UserId>,
}

impl StaticIdentity {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// Resolve an opaque token into an identity; a missing token is anonymous
    pub fn from_token(token: Option<&str>) -> Result<Self, DomainError> {
        match token {
            Some(token) => Ok(Self::new(UserId::parse(token)?)),
            None => Ok(Self::anonymous()),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Result<UserId, DomainError> {
        self.user_id.clone().ok_or(DomainError::Unauthenticated)
    }
}
