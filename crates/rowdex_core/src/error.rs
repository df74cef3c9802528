//! Error types for the index subsystem.

use std::io;
use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur in index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A unique index already maps the key to a different row.
    #[error("duplicate key {key} in unique index '{index}'")]
    DuplicateKey {
        /// Name of the index that rejected the write.
        index: String,
        /// Rendered form of the offending key.
        key: String,
    },

    /// An index with this name already exists.
    #[error("index '{name}' already exists")]
    DuplicateName {
        /// The colliding index name.
        name: String,
    },

    /// The strategy does not support the requested operation.
    #[error("unsupported operation on {kind} index: {message}")]
    UnsupportedOperation {
        /// Strategy kind of the index.
        kind: String,
        /// What was attempted.
        message: String,
    },

    /// The strategy cannot index the requested column(s).
    #[error("unsupported column type: {message}")]
    UnsupportedColumnType {
        /// Description of the mismatch.
        message: String,
    },

    /// A referenced index, key or row does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing item.
        what: String,
    },

    /// An invariant violation was detected inside an index structure.
    #[error("corrupt structure in index '{index}': {message}")]
    CorruptStructure {
        /// Name of the affected index.
        index: String,
        /// Description of the violated invariant.
        message: String,
    },

    /// Memory could not be reserved for a structural change.
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        /// Description of the failed reservation.
        message: String,
    },

    /// A key does not match the index's column list.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the mismatch.
        message: String,
    },

    /// The table already has a clustered index.
    #[error("table '{table}' already has clustered index '{existing}'")]
    ClusteredIndexExists {
        /// Table name.
        table: String,
        /// Name of the existing clustered index.
        existing: String,
    },

    /// Another process holds the index directory.
    #[error("index directory locked: another process has exclusive access")]
    CatalogLocked,

    /// The manager has been closed.
    #[error("index manager is closed")]
    ManagerClosed,

    /// Persisted catalog or snapshot data is malformed.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IndexError {
    /// Creates a duplicate key error.
    pub fn duplicate_key(index: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            index: index.into(),
            key: key.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported column type error.
    pub fn unsupported_column(message: impl Into<String>) -> Self {
        Self::UnsupportedColumnType {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a corrupt structure error.
    pub fn corrupt(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptStructure {
            index: index.into(),
            message: message.into(),
        }
    }

    /// Creates a resource exhausted error.
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Returns true if this error means the index structure can no longer be trusted.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptStructure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = IndexError::duplicate_key("users_email", "[\"a@b.c\"]");
        assert_eq!(
            err.to_string(),
            "duplicate key [\"a@b.c\"] in unique index 'users_email'"
        );

        let err = IndexError::unsupported("hash", "range scan");
        assert_eq!(err.to_string(), "unsupported operation on hash index: range scan");
    }

    #[test]
    fn corruption_is_classified() {
        assert!(IndexError::corrupt("idx", "height mismatch").is_corruption());
        assert!(!IndexError::not_found("idx").is_corruption());
    }
}
