// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! On-disk workspace layout.
//!
//! Everything the tool persists lives under one root directory, by default
//! `~/.deckhand`, overridable with `DECKHAND_HOME`:
//!
//! ```text
//! ~/.deckhand/
//!   config.yml                                  registry file
//!   compose/services/<service>/docker-compose.yml
//!   compose/stacks/<stack>/docker-compose.yml
//!   <run-id>.run                                run-state snapshots
//! ```
//!
//! Failing to create this layout is fatal at first use; nothing else in the
//! system can run without it.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Directory name under the user's home.
pub const DEFAULT_DIR_NAME: &str = ".deckhand";

/// Environment variable overriding the workspace root.
pub const HOME_ENV: &str = "DECKHAND_HOME";

/// File name of the service registry inside the workspace.
pub const REGISTRY_FILE: &str = "config.yml";

const COMPOSE_DIR: &str = "compose";
const SERVICES_DIR: &str = "services";
const STACKS_DIR: &str = "stacks";
const COMPOSE_FILE: &str = "docker-compose.yml";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("cannot determine a home directory for the workspace")]
    NoHome,

    #[error("cannot create workspace directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Handle to the workspace root with its path conventions.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Resolve the workspace from `DECKHAND_HOME` or the home directory and
    /// create its layout.
    pub fn resolve() -> Result<Self, WorkspaceError> {
        let root = match std::env::var_os(HOME_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(WorkspaceError::NoHome)?
                .join(DEFAULT_DIR_NAME),
        };
        Self::at(root)
    }

    /// Open a workspace at an explicit root, creating its layout.
    pub fn at(root: PathBuf) -> Result<Self, WorkspaceError> {
        let workspace = Self { root };
        workspace.ensure_layout()?;
        debug!(root = %workspace.root.display(), "workspace ready");
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the registry file.
    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    /// Directory holding one subdirectory per synthesized service.
    pub fn services_dir(&self) -> PathBuf {
        self.root.join(COMPOSE_DIR).join(SERVICES_DIR)
    }

    pub fn service_dir(&self, service: &str) -> PathBuf {
        self.services_dir().join(service)
    }

    /// Composition definition file for a single service.
    pub fn service_compose_file(&self, service: &str) -> PathBuf {
        self.service_dir(service).join(COMPOSE_FILE)
    }

    /// Directory holding one subdirectory per stack profile.
    pub fn stacks_dir(&self) -> PathBuf {
        self.root.join(COMPOSE_DIR).join(STACKS_DIR)
    }

    pub fn stack_dir(&self, stack: &str) -> PathBuf {
        self.stacks_dir().join(stack)
    }

    /// Base composition definition file for a stack profile.
    pub fn stack_compose_file(&self, stack: &str) -> PathBuf {
        self.stack_dir(stack).join(COMPOSE_FILE)
    }

    fn ensure_layout(&self) -> Result<(), WorkspaceError> {
        for dir in [self.root.clone(), self.services_dir(), self.stacks_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| WorkspaceError::Create {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ws");

        let workspace = Workspace::at(root.clone()).unwrap();

        assert!(workspace.services_dir().is_dir());
        assert!(workspace.stacks_dir().is_dir());
        assert_eq!(workspace.registry_file(), root.join("config.yml"));
    }

    #[test]
    fn test_path_conventions() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::at(dir.path().join("ws")).unwrap();

        assert!(workspace
            .service_compose_file("apache")
            .ends_with("compose/services/apache/docker-compose.yml"));
        assert!(workspace
            .stack_compose_file("elastic")
            .ends_with("compose/stacks/elastic/docker-compose.yml"));
    }
}
