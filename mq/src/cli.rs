//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use envstore::{AuthType, EnvironmentPatch};
use std::path::PathBuf;
use tracing::debug;

use crate::aggregator::AggregationMode;
use crate::mode::QueryMode;
use crate::runner::TimeRange;

/// mq - query many backend environments as one
#[derive(Parser)]
#[command(
    name = "mq",
    about = "Run one query across many backend environments and merge the results",
    version,
    after_help = after_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Environments file, overriding storage.environments-file
    #[arg(long = "environments-file", global = true)]
    pub environments_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage configured environments
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// Show or change the query mode
    Mode {
        #[command(subcommand)]
        command: ModeCommand,
    },

    /// Run a query against the active environments
    Query {
        /// Query text, e.g. "* | stats count by 'Log Source'"
        query: String,

        /// Relative time range (60m, 24h, 7d); defaults to runner.default-time-range
        #[arg(short, long)]
        time_range: Option<TimeRange>,

        /// Send the query without a time filter
        #[arg(long, conflicts_with = "time_range")]
        all_time: bool,

        /// Restrict to these environment ids (repeatable)
        #[arg(short, long = "env", value_name = "ID")]
        environments: Vec<String>,

        /// Per-environment timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Abort on the first failing environment
        #[arg(long)]
        fail_fast: bool,

        /// How successful results are combined (merge, group)
        #[arg(short, long, default_value = "merge")]
        aggregate: AggregationMode,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check connectivity to every active environment
    Probe {
        /// Restrict to these environment ids (repeatable)
        #[arg(short, long = "env", value_name = "ID")]
        environments: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Environment management subcommands
#[derive(Debug, Subcommand)]
pub enum EnvCommand {
    /// List environments
    List {
        /// Only active environments
        #[arg(long)]
        active: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one environment
    Show {
        /// Environment id
        id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Add an environment
    Add {
        /// Environment id (generated from the name when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Display name
        #[arg(long)]
        name: String,

        /// Region, e.g. us-ashburn-1
        #[arg(long)]
        region: String,

        /// Compartment id
        #[arg(long, default_value = "")]
        compartment: String,

        /// Namespace
        #[arg(long, default_value = envstore::DEFAULT_NAMESPACE)]
        namespace: String,

        /// Authentication (config_file, instance_principal, resource_principal)
        #[arg(long, default_value = "config_file")]
        auth_type: AuthType,

        /// Config-file profile
        #[arg(long, default_value = envstore::DEFAULT_CONFIG_PROFILE)]
        profile: String,

        /// Add as inactive
        #[arg(long)]
        inactive: bool,

        /// Make this the default environment
        #[arg(long)]
        default: bool,
    },

    /// Update fields of an environment (the id never changes)
    Update {
        /// Environment id
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        compartment: Option<String>,

        #[arg(long)]
        namespace: Option<String>,

        #[arg(long)]
        auth_type: Option<AuthType>,

        #[arg(long)]
        profile: Option<String>,

        /// Activate or deactivate (true, false)
        #[arg(long)]
        active: Option<bool>,
    },

    /// Remove an environment
    Remove {
        /// Environment id
        id: String,
    },

    /// Make an environment the default
    Default {
        /// Environment id
        id: String,
    },

    /// Import environments from a JSON array file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
}

impl EnvCommand {
    /// Whether the command writes the environments file
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List { .. } | Self::Show { .. })
    }

    /// Patch described by an `env update` invocation
    pub fn patch(&self) -> Option<EnvironmentPatch> {
        debug!("EnvCommand::patch: called");
        match self {
            Self::Update {
                name,
                region,
                compartment,
                namespace,
                auth_type,
                profile,
                active,
                ..
            } => Some(EnvironmentPatch {
                name: name.clone(),
                region: region.clone(),
                compartment_id: compartment.clone(),
                namespace: namespace.clone(),
                auth_type: *auth_type,
                config_profile: profile.clone(),
                is_active: *active,
            }),
            _ => None,
        }
    }
}

/// Query mode subcommands
#[derive(Debug, Subcommand)]
pub enum ModeCommand {
    /// Show the current query mode
    Show {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Change the query mode and save the config
    Set {
        /// Dispatch mode (single, parallel, sequential)
        #[arg(short, long)]
        mode: Option<QueryMode>,

        /// Maximum concurrent calls in parallel mode
        #[arg(short, long)]
        parallelism: Option<usize>,

        /// Default per-environment timeout in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("multiquery")
        .join("logs")
        .join("mq.log");
    debug!(?path, "get_log_path: returning path");
    path
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}

/// Output format for listing and query commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TimeUnit;

    #[test]
    fn test_cli_parse_env_list() {
        let cli = Cli::parse_from(["mq", "env", "list", "--active"]);
        assert!(matches!(
            cli.command,
            Command::Env {
                command: EnvCommand::List {
                    active: true,
                    format: OutputFormat::Text
                }
            }
        ));
    }

    #[test]
    fn test_cli_parse_env_add_defaults() {
        let cli = Cli::parse_from(["mq", "env", "add", "--name", "EMEA", "--region", "eu-frankfurt-1"]);
        match cli.command {
            Command::Env {
                command:
                    EnvCommand::Add {
                        id,
                        name,
                        region,
                        namespace,
                        auth_type,
                        profile,
                        inactive,
                        default,
                        ..
                    },
            } => {
                assert!(id.is_none());
                assert_eq!(name, "EMEA");
                assert_eq!(region, "eu-frankfurt-1");
                assert_eq!(namespace, "default");
                assert_eq!(auth_type, AuthType::ConfigFile);
                assert_eq!(profile, "DEFAULT");
                assert!(!inactive);
                assert!(!default);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_env_update_patch() {
        let cli = Cli::parse_from([
            "mq",
            "env",
            "update",
            "emea",
            "--region",
            "eu-amsterdam-1",
            "--active",
            "false",
        ]);
        let Command::Env { command } = cli.command else {
            panic!("expected env command");
        };

        let patch = command.patch().unwrap();
        assert_eq!(patch.region.as_deref(), Some("eu-amsterdam-1"));
        assert_eq!(patch.is_active, Some(false));
        assert!(patch.name.is_none());
    }

    #[test]
    fn test_env_command_mutation() {
        let Command::Env { command } = Cli::parse_from(["mq", "env", "list"]).command else {
            panic!("expected env command");
        };
        assert!(!command.is_mutation());

        let Command::Env { command } = Cli::parse_from(["mq", "env", "default", "emea"]).command else {
            panic!("expected env command");
        };
        assert!(command.is_mutation());
    }

    #[test]
    fn test_cli_parse_query() {
        let cli = Cli::parse_from([
            "mq",
            "query",
            "* | stats count",
            "-t",
            "24h",
            "--env",
            "a",
            "--env",
            "b",
            "--fail-fast",
            "--aggregate",
            "group",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Query {
                query,
                time_range,
                environments,
                fail_fast,
                aggregate,
                format,
                ..
            } => {
                assert_eq!(query, "* | stats count");
                assert_eq!(time_range, Some(TimeRange::new(24, TimeUnit::Hours)));
                assert_eq!(environments, vec!["a", "b"]);
                assert!(fail_fast);
                assert_eq!(aggregate, AggregationMode::Group);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_bad_time_range() {
        assert!(Cli::try_parse_from(["mq", "query", "*", "-t", "soon"]).is_err());
    }

    #[test]
    fn test_cli_parse_mode_set() {
        let cli = Cli::parse_from(["mq", "mode", "set", "--mode", "sequential", "--timeout-ms", "5000"]);
        assert!(matches!(
            cli.command,
            Command::Mode {
                command: ModeCommand::Set {
                    mode: Some(QueryMode::Sequential),
                    parallelism: None,
                    timeout_ms: Some(5000),
                }
            }
        ));
    }

    #[test]
    fn test_cli_global_config() {
        let cli = Cli::parse_from(["mq", "probe", "--config", "/tmp/mq.yml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mq.yml")));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
