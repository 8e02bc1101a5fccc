//! Coordinator error types

use thiserror::Error;

use crate::mode::ModeConfigError;

/// Errors that abort a coordinator call
///
/// `Timeout` and `EnvironmentFailed` only surface here when the call runs
/// with `continue_on_error = false`; otherwise they are recorded as failed
/// results.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("No active environments available")]
    NoActiveEnvironments,

    #[error("Environment {environment_name} ({environment_id}): Query timeout after {timeout_ms}ms")]
    Timeout {
        environment_id: String,
        environment_name: String,
        timeout_ms: u64,
    },

    #[error("Environment {environment_name} ({environment_id}) failed: {message}")]
    EnvironmentFailed {
        environment_id: String,
        environment_name: String,
        message: String,
    },

    #[error("Invalid query mode configuration: {0}")]
    InvalidConfig(#[from] ModeConfigError),
}

impl CoordinatorError {
    /// Environment that caused the abort, if any
    pub fn environment_id(&self) -> Option<&str> {
        match self {
            CoordinatorError::Timeout { environment_id, .. }
            | CoordinatorError::EnvironmentFailed { environment_id, .. } => Some(environment_id),
            CoordinatorError::NoActiveEnvironments | CoordinatorError::InvalidConfig(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CoordinatorError::Timeout { .. })
    }
}
