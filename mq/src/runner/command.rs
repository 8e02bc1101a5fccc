//! Shell-command query runner
//!
//! Runs a configured command once per environment, passing the environment
//! and query through `MQ_*` variables, and parses stdout as JSON. Typical
//! commands wrap the provider CLI, e.g.
//! `oci log-analytics query --region "$MQ_REGION" --query-string "$MQ_QUERY_STRING" ...`.

use std::process::Stdio;

use async_trait::async_trait;
use envstore::Environment;
use eyre::{Context, Result};
use serde_json::Value;
use tracing::debug;

use super::time_range::{TimeRange, compose_query};
use crate::coordinator::EnvironmentQuery;

/// Longest stderr excerpt carried into a failure message
const MAX_ERROR_CHARS: usize = 2_000;

/// [`EnvironmentQuery`] backed by a shell command
#[derive(Debug, Clone)]
pub struct CommandQuery {
    shell: String,
    command: String,
    query: String,
    time_range: Option<TimeRange>,
}

impl CommandQuery {
    pub fn new(shell: impl Into<String>, command: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            command: command.into(),
            query: query.into(),
            time_range: None,
        }
    }

    pub fn with_time_range(mut self, time_range: Option<TimeRange>) -> Self {
        self.time_range = time_range;
        self
    }

    /// Query text including the time filter
    pub fn query_string(&self) -> String {
        compose_query(&self.query, self.time_range.as_ref())
    }

    /// Variables exported to the command for `environment`
    pub fn env_vars(&self, environment: &Environment) -> Vec<(&'static str, String)> {
        vec![
            ("MQ_ENV_ID", environment.id.clone()),
            ("MQ_ENV_NAME", environment.name.clone()),
            ("MQ_REGION", environment.region.clone()),
            ("MQ_COMPARTMENT_ID", environment.compartment_id.clone()),
            ("MQ_NAMESPACE", environment.namespace.clone()),
            ("MQ_AUTH_TYPE", environment.auth_type.to_string()),
            ("MQ_AUTH_PROFILE", environment.config_profile.clone()),
            ("MQ_QUERY", self.query.clone()),
            (
                "MQ_TIME_FILTER",
                self.time_range.map(|range| range.filter_clause()).unwrap_or_default(),
            ),
            ("MQ_QUERY_STRING", self.query_string()),
        ]
    }
}

#[async_trait]
impl EnvironmentQuery for CommandQuery {
    type Output = Value;

    async fn query(&self, environment: &Environment) -> Result<Value> {
        debug!(env_id = %environment.id, shell = %self.shell, "CommandQuery::query: called");
        let output = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(&self.command)
            .envs(self.env_vars(environment))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .wrap_err_with(|| format!("Failed to run query command for {}", environment.id))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(MAX_ERROR_CHARS).collect();
            debug!(exit_code = ?output.status.code(), "CommandQuery::query: command failed");
            return Err(eyre::eyre!(
                "Exit code {}: {}",
                output.status.code().unwrap_or(-1),
                excerpt
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(stdout_len = stdout.len(), "CommandQuery::query: command succeeded");
        Ok(parse_output(&stdout))
    }
}

/// JSON when stdout is JSON, otherwise the trimmed text; empty output is null
fn parse_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env() -> Environment {
        Environment::new("emea", "EMEA", "eu-frankfurt-1").with_compartment("ocid1.compartment.oc1..emea")
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output("[1, 2]\n"), json!([1, 2]));
        assert_eq!(parse_output("{\"count\": 3}"), json!({"count": 3}));
        assert_eq!(parse_output("  plain text \n"), json!("plain text"));
        assert_eq!(parse_output(""), Value::Null);
    }

    #[test]
    fn test_env_vars() {
        let query = CommandQuery::new("sh", "true", "* | head 1").with_time_range(Some("1h".parse().unwrap()));
        let vars = query.env_vars(&env());
        let get = |key: &str| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone()).unwrap();

        assert_eq!(get("MQ_ENV_ID"), "emea");
        assert_eq!(get("MQ_COMPARTMENT_ID"), "ocid1.compartment.oc1..emea");
        assert_eq!(get("MQ_AUTH_TYPE"), "config_file");
        assert_eq!(get("MQ_TIME_FILTER"), "'Start Time' > dateRelative(1h)");
        assert_eq!(get("MQ_QUERY_STRING"), "'Start Time' > dateRelative(1h) and (* | head 1)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_parsed_as_json() {
        let query = CommandQuery::new("sh", r#"printf '[{"env": "%s", "region": "%s"}]' "$MQ_ENV_ID" "$MQ_REGION""#, "*");
        let value = query.query(&env()).await.unwrap();
        assert_eq!(value, json!([{"env": "emea", "region": "eu-frankfurt-1"}]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failure_carries_stderr() {
        let query = CommandQuery::new("sh", "echo 'NotAuthenticated' >&2; exit 3", "*");
        let err = query.query(&env()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Exit code 3"));
        assert!(message.contains("NotAuthenticated"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_error() {
        let query = CommandQuery::new("/nonexistent/shell-for-mq-tests", "true", "*");
        let err = query.query(&env()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to run query command for emea"));
    }
}
