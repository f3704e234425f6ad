//! Error types for the marker registry.

use crate::types::MarkerId;
use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Coarse classification of a registry failure.
///
/// Callers that need to branch on the failure should match on this rather
/// than on the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input.
    InvalidArgument,
    /// Unknown category or marker.
    NotFound,
    /// Category id collision.
    DuplicateKey,
    /// Category or per-category marker limit reached.
    CapacityExceeded,
}

/// Errors that can occur in registry operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// A required field is missing or a value is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced category does not exist.
    #[error("category not found: {id}")]
    CategoryNotFound {
        /// Category id that was looked up.
        id: String,
    },

    /// The referenced marker does not exist.
    #[error("marker not found: {id}")]
    MarkerNotFound {
        /// Marker id that was looked up.
        id: MarkerId,
    },

    /// A category with this id already exists.
    #[error("category already exists: {id}")]
    DuplicateCategory {
        /// The colliding id.
        id: String,
    },

    /// The registry already holds the maximum number of categories.
    #[error("category limit reached ({max})")]
    CategoryLimitReached {
        /// Configured maximum.
        max: usize,
    },

    /// The category already holds the maximum number of markers.
    #[error("category {id} is full ({max} markers)")]
    CategoryFull {
        /// Category id.
        id: String,
        /// Configured per-category maximum.
        max: usize,
    },
}

impl RegistryError {
    /// Creates an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RegistryError::CategoryNotFound { .. } | RegistryError::MarkerNotFound { .. } => {
                ErrorKind::NotFound
            }
            RegistryError::DuplicateCategory { .. } => ErrorKind::DuplicateKey,
            RegistryError::CategoryLimitReached { .. } | RegistryError::CategoryFull { .. } => {
                ErrorKind::CapacityExceeded
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::InvalidArgument(err.to_string())
    }
}
