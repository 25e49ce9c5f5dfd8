// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registry browsing commands
//!
//! Commands: catalog services, catalog stacks
//!
//! Pure registry reads; no engine connection is made.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use deckhand_core::application::TELEGRAF;

use super::context::open_registry;

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// List services available in the registry
    Services,

    /// List stacks and their member services
    Stacks,
}

pub async fn handle_command(command: CatalogCommand, home: Option<PathBuf>) -> Result<()> {
    let (_workspace, catalog) = open_registry(home)?;

    match command {
        CatalogCommand::Services => {
            if catalog.services().is_empty() {
                println!("{}", "No services in the registry".yellow());
                return Ok(());
            }

            println!("{} services:", catalog.services().len());
            println!("{:<20} {:<32} {}", "SERVICE", "IMAGE", "PORTS");
            for name in catalog.service_names() {
                let Some(spec) = catalog.service(&name) else {
                    continue;
                };
                let image = format!("{}:{}", spec.image, spec.version);
                let ports = spec
                    .ports
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                println!("{:<20} {:<32} {}", name, image, ports);
            }
            println!();
            println!(
                "{}",
                format!("built-in: {TELEGRAF} (engine metrics collector)").dimmed()
            );
        }
        CatalogCommand::Stacks => {
            if catalog.stacks().is_empty() {
                println!("{}", "No stacks in the registry".yellow());
                return Ok(());
            }

            println!("{} stacks:", catalog.stacks().len());
            println!("{:<20} {}", "STACK", "MEMBERS");
            for name in catalog.stack_names() {
                let Some(stack) = catalog.stack(&name) else {
                    continue;
                };
                let members = stack
                    .services
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                if stack.label.is_empty() {
                    println!("{:<20} {}", name, members);
                } else {
                    println!("{:<20} {}  {}", name, members, stack.label.dimmed());
                }
            }
        }
    }

    Ok(())
}
