//! Coordinator for multi-environment queries
//!
//! The QueryCoordinator fans one query out across environments:
//! - **Targets:** active-environment snapshot, optionally filtered by id
//! - **Dispatch:** single, parallel (bounded batches) or sequential
//! - **Timeout:** each call raced against a deadline, dropped on expiry
//! - **Failures:** recorded per environment, or abort the whole call

mod core;
mod error;
mod options;
mod query;
mod result;

pub use self::core::{QueryCoordinator, SharedRegistry, timeout_message};
pub use error::CoordinatorError;
pub use options::ExecuteOptions;
pub use query::{EnvironmentQuery, FnQuery, query_fn};
pub use result::EnvironmentQueryResult;
