// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service and stack start commands
//!
//! Commands: run service, run stack

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use tracing::info;

use deckhand_core::application::{ServiceManager, DEFAULT_PARALLELISM};
use deckhand_core::domain::{ContainerDescriptor, ResolvedService};

use super::context::AppContext;

#[derive(Subcommand)]
pub enum RunCommand {
    /// Start a single service container on the dev network
    Service {
        /// Service name as listed in the registry
        #[arg(value_name = "SERVICE")]
        name: String,

        /// Image version, overriding the registry pin
        #[arg(short = 'V', long, value_name = "VERSION")]
        version: Option<String>,

        /// Extra environment variable, KEY=VALUE (repeatable)
        #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = super::parse_env_var)]
        env: Vec<(String, String)>,
    },

    /// Start every member of a stack
    Stack {
        /// Stack name as listed in the registry
        #[arg(value_name = "STACK")]
        name: String,

        /// Image version applied to members without a pinned override
        #[arg(short = 'V', long, value_name = "VERSION")]
        version: Option<String>,
    },
}

pub async fn handle_command(command: RunCommand, home: Option<PathBuf>) -> Result<()> {
    let ctx = AppContext::init(home).await?;

    match command {
        RunCommand::Service { name, version, env } => {
            run_service(&ctx, &name, version.as_deref(), env).await
        }
        RunCommand::Stack { name, version } => run_stack(&ctx, &name, version.as_deref()).await,
    }
}

async fn run_service(
    ctx: &AppContext,
    name: &str,
    version: Option<&str>,
    env: Vec<(String, String)>,
) -> Result<()> {
    let Some(mut service) = ctx.manager.build(name, version, true) else {
        bail!("unknown service: {name} (see `deckhand catalog services`)");
    };
    if !env.is_empty() {
        service.set_env(env.into_iter().collect());
    }

    println!("Starting service {}...", service.name().bold());
    let descriptor = ctx.manager.run(&service).await?;

    println!(
        "{}",
        format!("✓ {} is {}", descriptor.name, descriptor.state).green()
    );
    print_access_hints(&service, &descriptor);
    Ok(())
}

async fn run_stack(ctx: &AppContext, name: &str, version: Option<&str>) -> Result<()> {
    let Some(members) = ctx.manager.resolve_stack(name, version) else {
        bail!("unknown stack: {name} (see `deckhand catalog stacks`)");
    };

    println!(
        "Starting stack {} ({} services)...",
        name.bold(),
        members.len()
    );
    let hints: Vec<(String, Vec<u16>)> = members
        .iter()
        .map(|member| (member.name().to_string(), member.ports().to_vec()))
        .collect();

    ctx.manager.run_many(members, DEFAULT_PARALLELISM).await?;
    info!("stack {name} is up");

    println!("{}", format!("✓ Stack {name} is up").green());
    for (member, ports) in hints {
        for port in ports {
            println!("  {:<20} localhost:{}", member, port);
        }
    }
    Ok(())
}

fn print_access_hints(service: &ResolvedService, descriptor: &ContainerDescriptor) {
    if let Some(ip) = &descriptor.ip_address {
        println!(
            "  Network:  {} (alias {})",
            ip,
            service.network_alias().cyan()
        );
    }
    for port in service.ports() {
        println!("  Port:     localhost:{port}");
    }
}
