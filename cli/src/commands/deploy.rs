// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compose-backed stack membership commands
//!
//! Commands: deploy, undeploy
//!
//! `deploy` attaches services to a running stack's compose profile and
//! brings the whole profile up; `undeploy` detaches them again, newest
//! first, and tears the profile down once the last member leaves.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use deckhand_core::application::ServiceManager;

use super::context::AppContext;

#[derive(Args)]
pub struct DeployCommand {
    /// Services to add to the stack's profile
    #[arg(value_name = "SERVICE", required = true, num_args = 1..)]
    pub services: Vec<String>,

    /// Stack whose profile receives the services
    #[arg(short, long, value_name = "STACK")]
    pub stack: String,

    /// Extra compose environment variable, KEY=VALUE (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = super::parse_env_var)]
    pub env: Vec<(String, String)>,
}

#[derive(Args)]
pub struct UndeployCommand {
    /// Services to remove from the stack's profile
    #[arg(value_name = "SERVICE", required = true, num_args = 1..)]
    pub services: Vec<String>,

    /// Stack whose profile the services leave
    #[arg(short, long, value_name = "STACK")]
    pub stack: String,

    /// Extra compose environment variable, KEY=VALUE (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = super::parse_env_var)]
    pub env: Vec<(String, String)>,
}

pub async fn deploy(command: DeployCommand, home: Option<PathBuf>) -> Result<()> {
    let ctx = AppContext::init(home).await?;
    let env: BTreeMap<String, String> = command.env.into_iter().collect();

    ctx.manager
        .add_services_to_compose(&command.stack, &command.services, &env)
        .await
        .with_context(|| {
            format!(
                "could not deploy {} into stack {}",
                command.services.join(", "),
                command.stack
            )
        })?;

    println!(
        "{}",
        format!(
            "✓ {} deployed into stack {}",
            command.services.join(", "),
            command.stack
        )
        .green()
    );
    Ok(())
}

pub async fn undeploy(command: UndeployCommand, home: Option<PathBuf>) -> Result<()> {
    let ctx = AppContext::init(home).await?;
    let env: BTreeMap<String, String> = command.env.into_iter().collect();

    ctx.manager
        .remove_services_from_compose(&command.stack, &command.services, &env)
        .await
        .with_context(|| {
            format!(
                "could not undeploy {} from stack {}",
                command.services.join(", "),
                command.stack
            )
        })?;

    println!(
        "{}",
        format!(
            "✓ {} removed from stack {}",
            command.services.join(", "),
            command.stack
        )
        .green()
    );
    Ok(())
}
