//! Per-environment query results

use std::time::Duration;

use envstore::Environment;
use serde::Serialize;

/// Outcome of one environment's call within one coordinator invocation
///
/// Fields are private: `data` is present exactly when the call succeeded and
/// `error` exactly when it failed, and results never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentQueryResult<T> {
    environment_id: String,
    environment_name: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    execution_time_ms: u64,
}

impl<T> EnvironmentQueryResult<T> {
    /// Successful call
    pub fn success(environment: &Environment, data: T, execution_time: Duration) -> Self {
        Self {
            environment_id: environment.id.clone(),
            environment_name: environment.name.clone(),
            success: true,
            data: Some(data),
            error: None,
            execution_time_ms: duration_ms(execution_time),
        }
    }

    /// Failed or timed-out call
    pub fn failure(environment: &Environment, error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            environment_id: environment.id.clone(),
            environment_name: environment.name.clone(),
            success: false,
            data: None,
            error: Some(error.into()),
            execution_time_ms: duration_ms(execution_time),
        }
    }

    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Consume the result, keeping only the data
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_has_data_only() {
        let env = Environment::new("a", "Alpha", "r");
        let result = EnvironmentQueryResult::success(&env, json!([1, 2]), Duration::from_millis(50));

        assert!(result.is_success());
        assert_eq!(result.data(), Some(&json!([1, 2])));
        assert_eq!(result.error(), None);
        assert_eq!(result.execution_time_ms(), 50);
        assert_eq!(result.environment_name(), "Alpha");
    }

    #[test]
    fn test_failure_has_error_only() {
        let env = Environment::new("c", "Charlie", "r");
        let result: EnvironmentQueryResult<i32> =
            EnvironmentQueryResult::failure(&env, "Query timeout after 10ms", Duration::from_millis(10));

        assert!(!result.is_success());
        assert!(result.data().is_none());
        assert_eq!(result.error(), Some("Query timeout after 10ms"));
        assert_eq!(result.into_data(), None);
    }

    #[test]
    fn test_serializes_camel_case_without_absent_fields() {
        let env = Environment::new("a", "Alpha", "r");
        let result = EnvironmentQueryResult::success(&env, 7, Duration::from_millis(3));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["environmentId"], "a");
        assert_eq!(value["executionTimeMs"], 3);
        assert_eq!(value["data"], 7);
        assert!(value.get("error").is_none());
    }
}
