// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration inspection commands
//!
//! Commands: show, path

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::context::open_registry;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved workspace and a registry summary
    Show,

    /// Print the registry file path, nothing else
    Path,
}

pub async fn handle_command(command: ConfigCommand, home: Option<PathBuf>) -> Result<()> {
    let (workspace, catalog) = open_registry(home)?;

    match command {
        ConfigCommand::Show => {
            println!("{}", "Workspace".bold());
            println!("  Root:     {}", workspace.root().display());
            println!("  Registry: {}", workspace.registry_file().display());
            println!("  Services: {}", workspace.services_dir().display());
            println!("  Stacks:   {}", workspace.stacks_dir().display());
            println!();
            println!("{}", "Registry".bold());
            println!("  {} services, {} stacks", catalog.services().len(), catalog.stacks().len());
            println!();
            println!(
                "{}",
                "Edit the registry file to pin versions or add services; missing built-ins are re-seeded on the next load, your entries stay."
                    .dimmed()
            );
        }
        ConfigCommand::Path => {
            // Bare output so it can be piped into an editor.
            println!("{}", workspace.registry_file().display());
        }
    }

    Ok(())
}
