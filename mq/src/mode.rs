//! Query mode configuration
//!
//! Selects how the coordinator dispatches a query across environments.
//! The config is an explicit value handed to every `execute` call; the
//! process-wide copy lives in [`Config`](crate::config::Config) and is
//! persisted whenever it changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Dispatch policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Query only the default environment
    Single,
    /// Query targets in bounded, overlapping batches
    #[default]
    Parallel,
    /// Query targets one at a time in registry order
    Sequential,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Parallel => write!(f, "parallel"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

impl std::str::FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            _ => Err(format!("Unknown query mode: {}. Use: single, parallel, or sequential", s)),
        }
    }
}

/// Invalid mode configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeConfigError {
    #[error("parallelism limit must be a positive integer")]
    ZeroParallelism,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Dispatch mode, parallelism limit and default per-call timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryModeConfig {
    /// Dispatch policy
    pub mode: QueryMode,

    /// Maximum calls in flight at once in parallel mode (batch size)
    #[serde(rename = "parallelism-limit")]
    pub parallelism_limit: usize,

    /// Default per-call timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for QueryModeConfig {
    fn default() -> Self {
        Self {
            mode: QueryMode::Parallel,
            parallelism_limit: 5,
            timeout_ms: 30_000,
        }
    }
}

impl QueryModeConfig {
    pub fn new(mode: QueryMode, parallelism_limit: usize, timeout_ms: u64) -> Self {
        Self {
            mode,
            parallelism_limit,
            timeout_ms,
        }
    }

    /// Default per-call timeout as a Duration
    pub fn timeout(&self) -> Duration {
        debug!(timeout_ms = %self.timeout_ms, "QueryModeConfig::timeout: called");
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether a failing environment is recorded (true) or aborts the call
    /// (false) when the caller does not say
    pub fn default_continue_on_error(&self) -> bool {
        !matches!(self.mode, QueryMode::Single)
    }

    pub fn validate(&self) -> Result<(), ModeConfigError> {
        if self.parallelism_limit == 0 {
            return Err(ModeConfigError::ZeroParallelism);
        }
        if self.timeout_ms == 0 {
            return Err(ModeConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
