//! Result aggregation
//!
//! Collapses per-environment results into one value. Only successful results
//! contribute; failures stay visible in the raw result list and in the
//! report's `failures` lines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::coordinator::EnvironmentQueryResult;

/// How successful results are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// One value: concatenated arrays, merged objects, or collected scalars
    #[default]
    Merge,
    /// Object keyed by environment id
    Group,
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Group => write!(f, "group"),
        }
    }
}

impl std::str::FromStr for AggregationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "group" => Ok(Self::Group),
            _ => Err(format!("Unknown aggregation mode: {}. Use: merge or group", s)),
        }
    }
}

/// Combine the successful results; `None` when nothing succeeded
pub fn aggregate(results: &[EnvironmentQueryResult<Value>], mode: AggregationMode) -> Option<Value> {
    debug!(count = results.len(), %mode, "aggregate: called");
    let successful: Vec<(&str, &Value)> = results
        .iter()
        .filter_map(|result| result.data().map(|data| (result.environment_id(), data)))
        .collect();

    if successful.is_empty() {
        debug!("aggregate: no successful results");
        return None;
    }

    Some(match mode {
        AggregationMode::Merge => merge(&successful),
        AggregationMode::Group => group(&successful),
    })
}

/// The shape of the first successful value decides the merge
fn merge(successful: &[(&str, &Value)]) -> Value {
    match successful[0].1 {
        Value::Array(_) => {
            let mut merged = Vec::new();
            for (env_id, data) in successful {
                match data {
                    Value::Array(items) => merged.extend(items.iter().cloned()),
                    other => {
                        debug!(%env_id, "merge: non-array value appended as one element");
                        merged.push((*other).clone());
                    }
                }
            }
            Value::Array(merged)
        }
        Value::Object(_) => {
            let mut merged = Map::new();
            for (env_id, data) in successful {
                match data {
                    Value::Object(fields) => {
                        for (key, value) in fields {
                            merged.insert(key.clone(), value.clone());
                        }
                    }
                    _ => warn!(%env_id, "Skipping non-object result while merging objects"),
                }
            }
            Value::Object(merged)
        }
        _ => Value::Array(successful.iter().map(|(_, data)| (*data).clone()).collect()),
    }
}

fn group(successful: &[(&str, &Value)]) -> Value {
    let grouped: Map<String, Value> = successful
        .iter()
        .map(|(env_id, data)| (env_id.to_string(), (*data).clone()))
        .collect();
    Value::Object(grouped)
}

/// One line per failed environment, e.g. `Environment EMEA failed: 401 Unauthorized`
pub fn failure_messages<T>(results: &[EnvironmentQueryResult<T>]) -> Vec<String> {
    results
        .iter()
        .filter_map(|result| {
            result
                .error()
                .map(|error| format!("Environment {} failed: {}", result.environment_name(), error))
        })
        .collect()
}

/// Aggregated value plus everything needed to surface partial failures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReport {
    /// True when at least one environment succeeded
    pub success: bool,
    pub aggregation_type: AggregationMode,
    pub data: Option<Value>,
    pub failures: Vec<String>,
    pub environment_results: Vec<EnvironmentQueryResult<Value>>,
}

impl AggregatedReport {
    pub fn build(results: Vec<EnvironmentQueryResult<Value>>, mode: AggregationMode) -> Self {
        let data = aggregate(&results, mode);
        Self {
            success: data.is_some(),
            aggregation_type: mode,
            data,
            failures: failure_messages(&results),
            environment_results: results,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.environment_results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.environment_results.len() - self.succeeded()
    }
}
