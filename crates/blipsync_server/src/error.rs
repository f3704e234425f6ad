//! Error types for the sync server.

use blipsync_core::{ErrorKind, RegistryError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors returned by the public server API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServerError {
    /// The registry rejected the mutation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The role has no entry in the role table.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

impl ServerError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Registry(err) => err.kind(),
            ServerError::UnknownRole(_) => ErrorKind::NotFound,
        }
    }
}
