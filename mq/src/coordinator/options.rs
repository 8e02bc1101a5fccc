//! Per-call coordinator options

use std::time::Duration;

/// Options for one `execute` call
///
/// Unset fields fall back to the [`QueryModeConfig`](crate::mode::QueryModeConfig)
/// in use: its timeout, and `continue_on_error = true` for parallel and
/// sequential mode or `false` for single mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Restrict targets to these environment ids (intersected with the active set)
    pub environment_ids: Option<Vec<String>>,

    /// Per-call timeout override
    pub timeout: Option<Duration>,

    /// Record failures and keep going (true) or abort on the first one (false)
    pub continue_on_error: Option<bool>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environments<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = Some(continue_on_error);
        self
    }
}
