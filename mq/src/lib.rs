//! multiquery - run one query across many backend environments
//!
//! Each configured environment is an independently addressable account and
//! region with its own credentials. A query is fanned out to the active
//! environments under a dispatch mode, each call is bounded by a timeout,
//! failures are recorded or abort the call, and the successful data is merged
//! or grouped into one value.
//!
//! # Core Concepts
//!
//! - **Snapshot Targets**: Each call works from the active set as it was when
//!   the call started
//! - **Bounded Parallelism**: Parallel mode runs batches of at most the
//!   configured limit
//! - **Tagged Results**: Every result names the environment it came from
//! - **Explicit Failures**: Failed environments stay visible next to the
//!   aggregated data
//!
//! # Modules
//!
//! - [`mode`] - Dispatch mode configuration
//! - [`coordinator`] - Target selection, dispatch and timeouts
//! - [`aggregator`] - Merge and group aggregation
//! - [`runner`] - Shell-command query runner and time ranges
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod mode;
pub mod runner;

// Re-export commonly used types
pub use aggregator::{AggregatedReport, AggregationMode, aggregate, failure_messages};
pub use config::Config;
pub use coordinator::{
    CoordinatorError, EnvironmentQuery, EnvironmentQueryResult, ExecuteOptions, QueryCoordinator, SharedRegistry,
    query_fn,
};
pub use mode::{ModeConfigError, QueryMode, QueryModeConfig};
pub use runner::{CommandQuery, TimeRange};
