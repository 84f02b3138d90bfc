//! Botvy CLI - host for directory-discovered plugins.
//!
//! Lists, resolves and validates plugin directories, and runs the configured
//! plugins against the binary's built-in module table.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod builtin;
mod commands;
mod config_bridge;
mod formatter;
mod theme;

use commands::{plugins, run};
use config_bridge::HostSettings;
use formatter::OutputFormat;

/// Botvy - plugin host
#[derive(Parser)]
#[command(name = "botvy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the layered user/workspace chain
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect plugin directories
    Plugins {
        #[command(subcommand)]
        command: PluginCommands,
    },

    /// Load and initialize the configured plugins
    Run {
        /// Plugins directory (overrides the configured one)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PluginCommands {
    /// List every plugin the directory loader finds
    List {
        /// Plugins directory (overrides the configured one)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Print the load order
    Resolve {
        /// Plugins directory (overrides the configured one)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Ignore the activation list and resolve every plugin found
        #[arg(long)]
        all: bool,
    },

    /// Check one plugin directory
    Validate {
        /// Path to the plugin directory
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace = std::env::current_dir().context("cannot determine working directory")?;

    let config = config_bridge::load_config(cli.config.as_deref(), &workspace);

    // Set up logging from config, with --verbose override.
    let log_config = match &config {
        Ok(cfg) => config_bridge::to_log_config(cfg, cli.verbose),
        Err(_) => {
            let level = if cli.verbose { "debug" } else { "info" };
            botvy_telemetry::LogConfig::new(level).with_format(botvy_telemetry::LogFormat::Compact)
        },
    };
    if let Err(e) = botvy_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let config = config?;
    let format: OutputFormat = cli.format.parse()?;

    match cli.command {
        Commands::Plugins { command } => match command {
            PluginCommands::List { dir } => {
                let settings = HostSettings::from_config(&config, &workspace, dir.as_deref())?;
                plugins::list(&settings.plugins_dir, format).await?;
            },
            PluginCommands::Resolve { dir, all } => {
                let settings = HostSettings::from_config(&config, &workspace, dir.as_deref())?;
                let active = if all {
                    None
                } else {
                    settings.active.as_deref()
                };
                plugins::resolve(&settings.plugins_dir, active, format).await?;
            },
            PluginCommands::Validate { path } => {
                plugins::validate(&path, format).await?;
            },
        },
        Commands::Run { dir } => {
            let settings = HostSettings::from_config(&config, &workspace, dir.as_deref())?;
            run::run(&settings, &workspace, format).await?;
        },
    }

    Ok(())
}
