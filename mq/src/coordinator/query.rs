//! The query operation the coordinator fans out

use std::future::Future;

use async_trait::async_trait;
use envstore::Environment;
use eyre::Result;

/// A single best-effort query against one environment
///
/// Implementations must be safe to call concurrently and must not depend on
/// the order in which environments are visited. A call may be dropped before
/// it completes when it exceeds the coordinator's timeout.
#[async_trait]
pub trait EnvironmentQuery: Send + Sync {
    /// Provider data returned by a successful call
    type Output: Send + 'static;

    /// Run the query against `environment`
    async fn query(&self, environment: &Environment) -> Result<Self::Output>;
}

/// Adapter turning an async closure into an [`EnvironmentQuery`]
pub struct FnQuery<F> {
    f: F,
}

/// Wrap `f` so it can be handed to the coordinator
///
/// ```ignore
/// let query = query_fn(|env: Environment| async move { client.search(&env).await });
/// ```
pub fn query_fn<F, Fut, T>(f: F) -> FnQuery<F>
where
    F: Fn(Environment) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
    T: Send + 'static,
{
    FnQuery { f }
}

#[async_trait]
impl<F, Fut, T> EnvironmentQuery for FnQuery<F>
where
    F: Fn(Environment) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
    T: Send + 'static,
{
    type Output = T;

    async fn query(&self, environment: &Environment) -> Result<T> {
        (self.f)(environment.clone()).await
    }
}
