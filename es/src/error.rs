//! Registry and store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an [`EnvironmentStore`](crate::EnvironmentStore)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by registry operations
///
/// Registry errors are configuration errors and are never recovered silently.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Environment already exists: {0}")]
    DuplicateId(String),

    #[error("Environment not found: {0}")]
    NotFound(String),

    #[error("Cannot remove {0}: it is the last remaining environment")]
    LastEnvironment(String),

    #[error("Invalid environment: {0}")]
    Invalid(String),

    #[error("Failed to persist environments: {0}")]
    Persistence(#[from] StoreError),
}

impl RegistryError {
    /// Check if this error was caused by the persistence collaborator
    pub fn is_persistence(&self) -> bool {
        matches!(self, RegistryError::Persistence(_))
    }
}
