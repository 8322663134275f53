use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use csync::config::{self, Config};
use csync::plugins::{PluginRegistry, discover_artifacts};
use csync::{DesktopNotifier, Reminder};

/// csync - sync your contributions across Jira, GitHub and Slack
#[derive(Parser)]
#[command(name = "csync", version, about)]
struct Cli {
    /// Config file path (defaults to csync/config.yaml in the user config directory)
    #[arg(long, env = "CSYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage plugins
    #[command(subcommand)]
    Plugin(PluginCommand),
    /// Show or change configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Start or test the contribution reminder
    #[command(subcommand)]
    Reminder(ReminderCommand),
}

#[derive(Subcommand)]
enum PluginCommand {
    /// List all registered plugins
    List,
    /// Load an external plugin artifact
    Load {
        /// Path to the artifact
        path: PathBuf,
        /// Also load this artifact on every future run
        #[arg(long)]
        persist: bool,
    },
    /// Execute a plugin by name
    Exec {
        /// Plugin name
        name: String,
        /// Sub-command and arguments passed to the plugin unchanged
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the current settings
    Show,
    /// Change one setting
    Set {
        /// Dotted key, e.g. reminder.time
        key: String,
        /// New value
        value: String,
    },
}

#[derive(Subcommand)]
enum ReminderCommand {
    /// Run the reminder until interrupted
    Start,
    /// Send one test notification
    Test,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "warn,csync=info",
        1 => "csync=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config::config_file_path().context("could not determine config directory")?,
    };
    let config = config::load_or_create(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command {
        Command::Plugin(cmd) => plugin_command(cmd, config, &config_path).await,
        Command::Config(cmd) => config_command(cmd, config, &config_path),
        Command::Reminder(cmd) => reminder_command(&cmd, config).await,
    }
}

async fn plugin_command(
    cmd: PluginCommand,
    mut config: Config,
    config_path: &Path,
) -> anyhow::Result<()> {
    let mut registry = build_registry(&config).await?;

    match cmd {
        PluginCommand::List => {
            println!("Available plugins:");
            for info in registry.list() {
                println!("  {:<10} {}", info.name, info.description);
            }
        }
        PluginCommand::Load { path, persist } => {
            let info = registry.load_external(&path, &config.load_options()).await?;
            println!("Loaded plugin: {} - {}", info.name, info.description);

            if persist {
                let resolved = std::fs::canonicalize(&path)
                    .with_context(|| format!("failed to resolve {}", path.display()))?;
                if config.add_external(resolved) {
                    config.save(config_path)?;
                    println!("Plugin will be loaded on startup");
                }
            }
        }
        PluginCommand::Exec { name, args } => {
            registry.execute_by_name(&name, &args).await?;
        }
    }

    Ok(())
}

fn config_command(
    cmd: ConfigCommand,
    mut config: Config,
    config_path: &Path,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show => {
            println!("Config file: {}\n", config_path.display());
            print!("{}", serde_yaml::to_string(&config)?);
        }
        ConfigCommand::Set { key, value } => {
            config.set(&key, &value)?;
            config.save(config_path)?;
            tracing::info!(key = %key, value = %value, "configuration updated");
            println!("Updated {key} = {value}");
        }
    }

    Ok(())
}

async fn reminder_command(cmd: &ReminderCommand, config: Config) -> anyhow::Result<()> {
    let reminder = Reminder::new(config.reminder, Arc::new(DesktopNotifier));

    match cmd {
        ReminderCommand::Test => {
            println!("Sending test notification...");
            reminder.send().await?;
            println!("Test notification sent");
        }
        ReminderCommand::Start => {
            println!("Reminder service started. Press Ctrl+C to stop.");
            reminder
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::warn!(error = %e, "failed to listen for ctrl-c");
                        std::future::pending::<()>().await;
                    }
                })
                .await;
        }
    }

    Ok(())
}

/// Build the registry: built-ins, then configured and discovered artifacts
///
/// A failing built-in is fatal; a failing artifact is logged and skipped.
async fn build_registry(config: &Config) -> anyhow::Result<PluginRegistry> {
    let mut registry = PluginRegistry::with_conflict_policy(config.plugins.on_conflict);
    registry
        .register_builtins()
        .context("failed to register built-in plugins")?;

    let mut seen = HashSet::new();
    let artifacts: Vec<PathBuf> = config
        .plugins
        .external
        .iter()
        .cloned()
        .chain(discover_artifacts(&config.plugins.search_dirs))
        .filter(|path| seen.insert(std::fs::canonicalize(path).unwrap_or_else(|_| path.clone())))
        .collect();

    if !artifacts.is_empty() {
        let loaded = registry
            .load_all_external(&artifacts, &config.load_options())
            .await;
        tracing::debug!(
            requested = artifacts.len(),
            loaded = loaded.len(),
            "loaded external plugins"
        );
    }

    Ok(registry)
}
