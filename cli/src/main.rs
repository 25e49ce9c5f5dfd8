// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # deckhand CLI
//!
//! The `deckhand` binary drives development services and stacks on the
//! local container engine from a declarative registry under `~/.deckhand`.
//!
//! ## Commands
//!
//! - `deckhand run service|stack <name>` - Start containers on the dev network
//! - `deckhand stop service|stack <name>` - Stop and remove them again
//! - `deckhand deploy|undeploy <service...> --stack <stack>` - Manage a stack's compose profile
//! - `deckhand catalog services|stacks` - Browse the registry
//! - `deckhand config show|path` - Inspect workspace and registry locations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{CatalogCommand, ConfigCommand, RunCommand, StopCommand};

/// deckhand - declarative dev services and stacks on the local container engine
// No propagate_version: `--version` on the run/stop subcommands selects an
// image tag, so the binary version flag stays on the top-level command only.
#[derive(Parser)]
#[command(name = "deckhand")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Workspace directory (overrides `~/.deckhand` discovery)
    #[arg(long, global = true, env = "DECKHAND_HOME", value_name = "DIR")]
    home: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(
        short = 'v',
        long = "verbosity",
        global = true,
        action = clap::ArgAction::Count
    )]
    verbosity: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start services or stacks on the local engine
    #[command(name = "run")]
    Run {
        #[command(subcommand)]
        command: RunCommand,
    },

    /// Stop running services or stacks
    #[command(name = "stop")]
    Stop {
        #[command(subcommand)]
        command: StopCommand,
    },

    /// Add services to a stack's compose profile and bring it up
    #[command(name = "deploy")]
    Deploy {
        #[command(flatten)]
        command: commands::DeployCommand,
    },

    /// Remove services from a stack's compose profile
    #[command(name = "undeploy")]
    Undeploy {
        #[command(flatten)]
        command: commands::UndeployCommand,
    },

    /// Browse the service registry
    #[command(name = "catalog")]
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },

    /// Inspect the deckhand configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), error);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbosity)?;

    match cli.command {
        Some(Commands::Run { command }) => commands::run::handle_command(command, cli.home).await,
        Some(Commands::Stop { command }) => commands::stop::handle_command(command, cli.home).await,
        Some(Commands::Deploy { command }) => commands::deploy::deploy(command, cli.home).await,
        Some(Commands::Undeploy { command }) => {
            commands::deploy::undeploy(command, cli.home).await
        }
        Some(Commands::Catalog { command }) => {
            commands::catalog::handle_command(command, cli.home).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.home).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
