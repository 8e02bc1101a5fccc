//! Main QueryCoordinator implementation

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use envstore::{Environment, EnvironmentRegistry, RegistrySnapshot};
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::CoordinatorError;
use super::options::ExecuteOptions;
use super::query::EnvironmentQuery;
use super::result::EnvironmentQueryResult;
use crate::mode::{ModeConfigError, QueryMode, QueryModeConfig};

/// Registry shared between the coordinator and whoever mutates it
///
/// `execute` holds the read lock only while it snapshots, so snapshotting is
/// mutually exclusive with mutation and never spans a dispatch.
pub type SharedRegistry = Arc<RwLock<EnvironmentRegistry>>;

/// Failure message recorded for a call that exceeded `timeout`
pub fn timeout_message(timeout: Duration) -> String {
    format!("Query timeout after {}ms", timeout.as_millis())
}

/// How one dispatched call ended
enum CallOutcome<T> {
    Completed(T),
    Failed(String),
    TimedOut(Duration),
}

/// A settled call, not yet checked against the failure policy
struct Dispatched<'a, T> {
    environment: &'a Environment,
    outcome: CallOutcome<T>,
    elapsed: Duration,
}

impl<T> Dispatched<'_, T> {
    /// Turn the call into a result, or into the error that aborts `execute`
    fn settle(self, continue_on_error: bool) -> Result<EnvironmentQueryResult<T>, CoordinatorError> {
        let env = self.environment;
        match self.outcome {
            CallOutcome::Completed(data) => {
                debug!(env_id = %env.id, elapsed = ?self.elapsed, "Dispatched::settle: success");
                Ok(EnvironmentQueryResult::success(env, data, self.elapsed))
            }
            CallOutcome::Failed(message) if continue_on_error => {
                warn!(env_id = %env.id, %message, "Environment query failed, continuing");
                Ok(EnvironmentQueryResult::failure(env, message, self.elapsed))
            }
            CallOutcome::Failed(message) => Err(CoordinatorError::EnvironmentFailed {
                environment_id: env.id.clone(),
                environment_name: env.name.clone(),
                message,
            }),
            CallOutcome::TimedOut(timeout) if continue_on_error => {
                warn!(env_id = %env.id, timeout_ms = %timeout.as_millis(), "Environment query timed out, continuing");
                Ok(EnvironmentQueryResult::failure(env, timeout_message(timeout), self.elapsed))
            }
            CallOutcome::TimedOut(timeout) => Err(CoordinatorError::Timeout {
                environment_id: env.id.clone(),
                environment_name: env.name.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

/// Runs one query across the registry's active environments
#[derive(Clone)]
pub struct QueryCoordinator {
    registry: SharedRegistry,
}

impl QueryCoordinator {
    pub fn new(registry: SharedRegistry) -> Self {
        debug!("QueryCoordinator::new: called");
        Self { registry }
    }

    /// Take ownership of a registry and share it
    pub fn from_registry(registry: EnvironmentRegistry) -> Self {
        Self::new(Arc::new(RwLock::new(registry)))
    }

    /// The registry this coordinator snapshots from
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Execute `query` against the selected environments
    ///
    /// Returns one result per target in target order. With
    /// `continue_on_error = false` the first failure (in dispatch order)
    /// aborts the call and no partial results are returned. In parallel mode
    /// the abort happens only once the whole batch has settled, so a call
    /// that fails at once still waits for slower batch members, up to the
    /// timeout, and a timed-out member earlier in the batch is the error
    /// reported.
    ///
    /// A per-call timeout of zero is rejected like a zero `timeout_ms`.
    pub async fn execute<Q>(
        &self,
        mode: &QueryModeConfig,
        query: &Q,
        options: ExecuteOptions,
    ) -> Result<Vec<EnvironmentQueryResult<Q::Output>>, CoordinatorError>
    where
        Q: EnvironmentQuery + ?Sized,
    {
        debug!(mode = %mode.mode, ?options, "QueryCoordinator::execute: called");
        mode.validate()?;
        if options.timeout == Some(Duration::ZERO) {
            return Err(ModeConfigError::ZeroTimeout.into());
        }

        let snapshot = self.registry.read().await.snapshot();
        let targets = select_targets(&snapshot, options.environment_ids.as_deref())?;
        let timeout = options.timeout.unwrap_or_else(|| mode.timeout());
        let continue_on_error = options
            .continue_on_error
            .unwrap_or_else(|| mode.default_continue_on_error());

        info!(
            mode = %mode.mode,
            targets = targets.len(),
            timeout_ms = %timeout.as_millis(),
            continue_on_error,
            "Executing multi-environment query"
        );

        let results = match mode.mode {
            QueryMode::Single => {
                let target = single_target(&snapshot, &targets)?;
                vec![dispatch(query, target, timeout).await.settle(continue_on_error)?]
            }
            QueryMode::Sequential => {
                let mut results = Vec::with_capacity(targets.len());
                for env in &targets {
                    results.push(dispatch(query, env, timeout).await.settle(continue_on_error)?);
                }
                results
            }
            QueryMode::Parallel => {
                let mut results = Vec::with_capacity(targets.len());
                for (index, batch) in targets.chunks(mode.parallelism_limit).enumerate() {
                    debug!(batch = index, size = batch.len(), "QueryCoordinator::execute: dispatching batch");
                    // join_all polls every call before any completes; the batch
                    // settles fully before the next one starts
                    let settled = join_all(batch.iter().map(|env| dispatch(query, env, timeout))).await;
                    for dispatched in settled {
                        results.push(dispatched.settle(continue_on_error)?);
                    }
                }
                results
            }
        };

        let failed = results.iter().filter(|result| !result.is_success()).count();
        info!(total = results.len(), failed, "Multi-environment query complete");
        Ok(results)
    }
}

/// Run one call bounded by `timeout`
///
/// On expiry the call's future is dropped, which cancels it cooperatively;
/// its eventual outcome is never observed.
async fn dispatch<'a, Q>(query: &Q, environment: &'a Environment, timeout: Duration) -> Dispatched<'a, Q::Output>
where
    Q: EnvironmentQuery + ?Sized,
{
    debug!(env_id = %environment.id, "dispatch: called");
    let started = Instant::now();
    let outcome = match tokio::time::timeout(timeout, query.query(environment)).await {
        Ok(Ok(data)) => CallOutcome::Completed(data),
        Ok(Err(e)) => CallOutcome::Failed(format!("{:#}", e)),
        Err(_) => CallOutcome::TimedOut(timeout),
    };

    Dispatched {
        environment,
        outcome,
        elapsed: started.elapsed(),
    }
}

/// Active environments, restricted to `filter` when given, in registry order
fn select_targets(snapshot: &RegistrySnapshot, filter: Option<&[String]>) -> Result<Vec<Environment>, CoordinatorError> {
    let targets: Vec<Environment> = match filter {
        Some(ids) => {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            let targets: Vec<Environment> = snapshot
                .active
                .iter()
                .filter(|env| wanted.contains(env.id.as_str()))
                .cloned()
                .collect();
            if targets.len() < wanted.len() {
                debug!(
                    requested = wanted.len(),
                    matched = targets.len(),
                    "select_targets: some requested environments are unknown or inactive"
                );
            }
            targets
        }
        None => snapshot.active.clone(),
    };

    if targets.is_empty() {
        return Err(CoordinatorError::NoActiveEnvironments);
    }
    Ok(targets)
}

/// The default environment if it is a target, otherwise the first target
fn single_target<'a>(snapshot: &RegistrySnapshot, targets: &'a [Environment]) -> Result<&'a Environment, CoordinatorError> {
    let default_id = snapshot.default.as_ref().map(|env| env.id.as_str());
    if let Some(env) = targets.iter().find(|env| Some(env.id.as_str()) == default_id) {
        return Ok(env);
    }

    let fallback = targets.first().ok_or(CoordinatorError::NoActiveEnvironments)?;
    warn!(env_id = %fallback.id, "Default environment is not a query target, using first target");
    Ok(fallback)
}
