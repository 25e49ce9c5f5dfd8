// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service and stack stop commands
//!
//! Commands: stop service, stop stack

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use deckhand_core::application::{ServiceManager, DEFAULT_PARALLELISM};

use super::context::AppContext;

#[derive(Subcommand)]
pub enum StopCommand {
    /// Stop and remove a single service container
    Service {
        /// Service name as listed in the registry
        #[arg(value_name = "SERVICE")]
        name: String,

        /// Image version the service was started with, if not the registry pin
        #[arg(short = 'V', long, value_name = "VERSION")]
        version: Option<String>,
    },

    /// Stop and remove every member of a stack
    Stack {
        /// Stack name as listed in the registry
        #[arg(value_name = "STACK")]
        name: String,
    },
}

pub async fn handle_command(command: StopCommand, home: Option<PathBuf>) -> Result<()> {
    let ctx = AppContext::init(home).await?;

    match command {
        StopCommand::Service { name, version } => {
            let Some(service) = ctx.manager.build(&name, version.as_deref(), true) else {
                bail!("unknown service: {name} (see `deckhand catalog services`)");
            };
            ctx.manager.stop(&service).await?;
            println!("{}", format!("✓ {name} stopped").green());
            Ok(())
        }
        StopCommand::Stack { name } => {
            let Some(members) = ctx.manager.resolve_stack(&name, None) else {
                bail!("unknown stack: {name} (see `deckhand catalog stacks`)");
            };
            ctx.manager.stop_many(members, DEFAULT_PARALLELISM).await?;
            println!("{}", format!("✓ Stack {name} stopped").green());
            Ok(())
        }
    }
}
