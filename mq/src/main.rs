//! mq - multi-environment query client
//!
//! CLI entry point for managing environments and running queries across them.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use envstore::{Environment, EnvironmentRegistry, JsonFileStore, generate_id};
use multiquery::aggregator::AggregatedReport;
use multiquery::cli::{Cli, Command, EnvCommand, ModeCommand, OutputFormat, get_log_path};
use multiquery::config::Config;
use multiquery::coordinator::{ExecuteOptions, QueryCoordinator};
use multiquery::mode::{QueryMode, QueryModeConfig};
use multiquery::runner::CommandQuery;

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let level = match cli_log_level.map(|s| s.to_uppercase()).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    let environments_file = cli
        .environments_file
        .clone()
        .unwrap_or_else(|| config.storage.environments_path());
    info!(environments_file = %environments_file.display(), "mq loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Env { command } => {
            debug!(?command, "main: matched Env command");
            cmd_env(&environments_file, command)
        }
        Command::Mode { command } => {
            debug!(?command, "main: matched Mode command");
            let save_path = Config::save_path(cli.config.as_ref());
            cmd_mode(config, &save_path, command)
        }
        Command::Query {
            query,
            time_range,
            all_time,
            environments,
            timeout_ms,
            fail_fast,
            aggregate,
            format,
        } => {
            debug!(%query, ?time_range, ?environments, fail_fast, "main: matched Query command");
            let range = if all_time {
                None
            } else {
                time_range.or(config.runner.default_time_range)
            };
            let runner = CommandQuery::new(&config.runner.shell, runner_command(&config)?, query).with_time_range(range);

            let mut options = ExecuteOptions::new();
            if !environments.is_empty() {
                options = options.with_environments(environments);
            }
            if let Some(timeout_ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(timeout_ms));
            }
            if fail_fast {
                options = options.with_continue_on_error(false);
            }

            let coordinator = QueryCoordinator::from_registry(open_registry(&environments_file));
            let results = coordinator
                .execute(&config.query, &runner, options)
                .await
                .context("Query failed")?;
            let report = AggregatedReport::build(results, aggregate);
            print_report(&report, format)?;

            if !report.success {
                return Err(eyre::eyre!("Query failed in all {} environments", report.failed()));
            }
            Ok(())
        }
        Command::Probe { environments, format } => {
            debug!(?environments, "main: matched Probe command");
            cmd_probe(&config, &environments_file, environments, format).await
        }
    }
}

fn open_registry(path: &Path) -> EnvironmentRegistry {
    debug!(path = %path.display(), "open_registry: called");
    let registry = EnvironmentRegistry::open(Arc::new(JsonFileStore::new(path)));
    if let Some(error) = registry.load_error() {
        eprintln!(
            "{} Could not read {}: {}. Using the default environment only; the unreadable file is moved to a .bak file on the next change.",
            "warning:".yellow(),
            path.display(),
            error
        );
    }
    registry
}

fn runner_command(config: &Config) -> Result<String> {
    config
        .runner
        .command
        .clone()
        .ok_or_else(|| eyre::eyre!("No query command configured. Set runner.command in the config file"))
}

fn cmd_env(environments_file: &Path, command: EnvCommand) -> Result<()> {
    debug!(?command, "cmd_env: called");
    let patch = command.patch();

    // Held from load to save so concurrent mutations cannot drop each other
    let _lock = if command.is_mutation() {
        Some(JsonFileStore::new(environments_file).lock()?)
    } else {
        None
    };
    let mut registry = open_registry(environments_file);

    match command {
        EnvCommand::List { active, format } => {
            let environments: Vec<&Environment> = if active {
                registry.list_active()
            } else {
                registry.list().iter().collect()
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&environments)?),
                OutputFormat::Text => {
                    if environments.is_empty() {
                        println!("No environments found");
                    }
                    for env in environments {
                        print_environment_line(env);
                    }
                }
            }
        }
        EnvCommand::Show { id, format } => {
            let env = registry
                .get(&id)
                .ok_or_else(|| eyre::eyre!("Environment not found: {}", id))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(env)?),
                OutputFormat::Text => {
                    println!("{} {}", "Environment:".bold(), env.id.cyan());
                    println!("  Name:        {}", env.name);
                    println!("  Region:      {}", env.region);
                    println!("  Compartment: {}", env.compartment_id);
                    println!("  Namespace:   {}", env.namespace);
                    println!("  Auth:        {} ({})", env.auth_type, env.config_profile);
                    println!("  Active:      {}", env.is_active);
                    println!("  Default:     {}", env.is_default);
                }
            }
        }
        EnvCommand::Add {
            id,
            name,
            region,
            compartment,
            namespace,
            auth_type,
            profile,
            inactive,
            default,
        } => {
            let id = id.unwrap_or_else(|| generate_id(&name));
            let env = Environment::new(&id, name, region)
                .with_compartment(compartment)
                .with_namespace(namespace)
                .with_auth(auth_type, profile)
                .with_active(!inactive)
                .with_default(default);
            registry.add(env)?;
            println!("{} Added environment: {}", "✓".green(), id.cyan());
        }
        EnvCommand::Update { id, .. } => {
            let patch = patch.unwrap_or_default();
            if patch.is_empty() {
                return Err(eyre::eyre!("Nothing to update for {}", id));
            }
            registry.update(&id, &patch)?;
            println!("{} Updated environment: {}", "✓".green(), id.cyan());
        }
        EnvCommand::Remove { id } => {
            registry.remove(&id)?;
            println!("{} Removed environment: {}", "✓".green(), id.cyan());
            if let Some(default) = registry.get_default() {
                println!("  Default environment: {}", default.id.cyan());
            }
        }
        EnvCommand::Default { id } => {
            registry.set_default(&id)?;
            println!("{} Default environment: {}", "✓".green(), id.cyan());
        }
        EnvCommand::Import { file } => {
            let content =
                fs::read_to_string(&file).context(format!("Failed to read {}", file.display()))?;
            let environments: Vec<Environment> =
                serde_json::from_str(&content).context(format!("Failed to parse {}", file.display()))?;
            let count = registry.import(environments)?;
            println!("{} Imported {} environments from {}", "✓".green(), count, file.display());
        }
    }
    Ok(())
}

fn print_environment_line(env: &Environment) {
    let marker = if env.is_default { "*".yellow().bold() } else { " ".normal() };
    let status = if env.is_active {
        "active".green()
    } else {
        "inactive".dimmed()
    };
    println!(
        "{} {:<20} {:<28} {:<16} {}",
        marker,
        env.id.cyan(),
        env.name,
        env.region,
        status
    );
}

fn cmd_mode(mut config: Config, save_path: &Path, command: ModeCommand) -> Result<()> {
    debug!(?command, "cmd_mode: called");
    match command {
        ModeCommand::Show { format } => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config.query)?),
            OutputFormat::Text => {
                println!("Mode:        {}", config.query.mode.to_string().cyan());
                println!("Parallelism: {}", config.query.parallelism_limit);
                println!("Timeout:     {}ms", config.query.timeout_ms);
            }
        },
        ModeCommand::Set {
            mode,
            parallelism,
            timeout_ms,
        } => {
            let current = &config.query;
            let next = QueryModeConfig::new(
                mode.unwrap_or(current.mode),
                parallelism.unwrap_or(current.parallelism_limit),
                timeout_ms.unwrap_or(current.timeout_ms),
            );
            config.set_query_mode(next)?;
            config.save(save_path)?;
            println!(
                "{} Query mode: {} (parallelism {}, timeout {}ms)",
                "✓".green(),
                config.query.mode.to_string().cyan(),
                config.query.parallelism_limit,
                config.query.timeout_ms
            );
        }
    }
    Ok(())
}

async fn cmd_probe(
    config: &Config,
    environments_file: &Path,
    environments: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    debug!(?environments, "cmd_probe: called");
    let runner = CommandQuery::new(&config.runner.shell, runner_command(config)?, &config.runner.probe_query)
        .with_time_range(Some(config.runner.probe_time_range));

    // Probe every target regardless of the configured mode
    let mut mode = config.query.clone();
    if mode.mode == QueryMode::Single {
        mode.mode = QueryMode::Parallel;
    }

    let mut options = ExecuteOptions::new().with_continue_on_error(true);
    if !environments.is_empty() {
        options = options.with_environments(environments);
    }

    let coordinator = QueryCoordinator::from_registry(open_registry(environments_file));
    let results = coordinator.execute(&mode, &runner, options).await?;
    let failed = results.iter().filter(|r| !r.is_success()).count();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            for result in &results {
                if result.is_success() {
                    println!(
                        "{} {:<28} connected ({}ms)",
                        "✓".green(),
                        result.environment_name(),
                        result.execution_time_ms()
                    );
                } else {
                    println!(
                        "{} {:<28} {}",
                        "✗".red(),
                        result.environment_name(),
                        result.error().unwrap_or_default()
                    );
                }
            }
        }
    }

    if failed > 0 {
        return Err(eyre::eyre!("{} of {} environments unreachable", failed, results.len()));
    }
    Ok(())
}

fn print_report(report: &AggregatedReport, format: OutputFormat) -> Result<()> {
    debug!(succeeded = report.succeeded(), failed = report.failed(), "print_report: called");
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
            for failure in &report.failures {
                eprintln!("{} {}", "warning:".yellow(), failure);
            }
        }
        OutputFormat::Text => {
            for result in &report.environment_results {
                match result.error() {
                    None => println!(
                        "{} {} ({}ms)",
                        "✓".green(),
                        result.environment_name(),
                        result.execution_time_ms()
                    ),
                    Some(error) => println!(
                        "{} {} ({}ms): {}",
                        "✗".red(),
                        result.environment_name(),
                        result.execution_time_ms(),
                        error
                    ),
                }
            }
            if let Some(data) = &report.data {
                println!();
                println!("{}", serde_json::to_string_pretty(data)?);
            }
            println!();
            println!(
                "{} succeeded, {} failed ({})",
                report.succeeded().to_string().green(),
                report.failed().to_string().red(),
                report.aggregation_type
            );
        }
    }
    Ok(())
}
