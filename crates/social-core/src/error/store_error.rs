//! Errors raised by document store connectors

use thiserror::Error;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {path}/{id}")]
    NotFound { path: String, id: String },

    /// Connectivity lost or store unreachable
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid patch on field `{field}`: {reason}")]
    InvalidPatch { field: String, reason: String },
}

impl StoreError {
    pub fn not_found(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            id: id.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Transport-level failures are the only ones a reconnect can fix
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(StoreError::transport("reset").is_transport());
        assert!(!StoreError::not_found("/posts", "1").is_transport());
    }

    #[test]
    fn test_display() {
        let err = StoreError::not_found("/artifacts/a/posts", "42");
        assert_eq!(err.to_string(), "Document not found: /artifacts/a/posts/42");
    }
}
