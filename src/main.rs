//! Command-line front end.
//!
//! - `check` resolves the configuration once and prints it as JSON
//! - `watch` keeps it live, logging every reload until Ctrl-C

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use companion_core::config::{ConfigManager, ConfigResolver};
use companion_core::events::{Event, EventHandlerModel, ProcessDispatcher};
use companion_core::observability::logging;

#[derive(Parser)]
#[command(name = "companion-core")]
#[command(about = "Resolve, validate and watch the companion configuration", long_about = None)]
struct Cli {
    /// Directory holding config.toml and profile files
    #[arg(short, long, default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Profile to load on top of the main file; repeatable, first wins
    #[arg(short, long = "profile", global = true)]
    profiles: Vec<String>,

    /// Override a config key, e.g. `--set ocr.ocrspace.engine=3`
    #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_override, global = true)]
    overrides: Vec<(String, String)>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and validate once, then print the result
    Check,
    /// Keep the configuration live and report reloads
    Watch,
}

/// Fired after every applied reload so users can hook it.
#[derive(Serialize)]
struct ConfigReloaded {
    profiles: Vec<String>,
}

impl Event for ConfigReloaded {
    fn name(&self) -> &str {
        "config-reload"
    }
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let overrides: BTreeMap<String, String> = cli.overrides.into_iter().collect();

    match cli.command {
        Commands::Check => {
            let resolver = ConfigResolver::new(&cli.config_dir, &overrides)?;
            let read = resolver.initial_read(&cli.profiles)?;
            tracing::info!(profiles = ?read.result.loaded_profile_names, "Configuration is valid");
            println!("{}", serde_json::to_string_pretty(&*read.result.snapshot)?);
        }
        Commands::Watch => {
            let (manager, mut reloads) = ConfigManager::with_channel();
            let loaded = manager.initiate(&cli.config_dir, &cli.profiles, &overrides)?;
            let profiles = loaded.loaded_profile_names;
            tracing::info!(config_dir = %cli.config_dir.display(), profiles = ?profiles, "Configuration loaded");

            let model = EventHandlerModel::<ConfigReloaded>::new();
            model.apply_config(&loaded.snapshot);
            let (commands_tx, mut commands_rx) = tokio::sync::mpsc::unbounded_channel();
            let dispatcher = ProcessDispatcher::new(commands_tx);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted, shutting down");
                        break;
                    }
                    Some(command) = commands_rx.recv() => {
                        tracing::info!(command = %command, "Built-in command requested by event handler");
                    }
                    outcome = reloads.recv() => match outcome {
                        Some(Ok(config)) => {
                            let handlers = model.apply_config(&config);
                            tracing::info!(handlers, "Applied new configuration");
                            model.dispatch(&ConfigReloaded { profiles: profiles.clone() }, &dispatcher);
                        }
                        Some(Err(e)) => tracing::warn!("Configuration not reloaded: {}", e),
                        None => break,
                    },
                }
            }

            manager.teardown();
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
