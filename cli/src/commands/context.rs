// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared command wiring: workspace discovery, registry loading, and the
//! fully assembled service manager.
//!
//! Commands that only browse the registry call [`open_registry`] and skip
//! the engine preflight; commands that create or remove containers go
//! through [`AppContext::init`], which refuses to proceed when no `docker`
//! binary is on the `PATH`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use deckhand_core::application::{StandardServiceLifecycle, StandardServiceManager};
use deckhand_core::domain::{Catalog, ContainerEngine};
use deckhand_core::infrastructure::{
    ComposeRunner, ComposeSynthesizer, DockerComposeRunner, DockerEngine, Workspace,
};

/// Everything a container-touching command needs, wired once per invocation.
pub struct AppContext {
    pub workspace: Arc<Workspace>,
    pub catalog: Arc<Catalog>,
    pub manager: Arc<StandardServiceManager>,
}

impl AppContext {
    /// Assemble the full manager stack against the local engine.
    pub async fn init(home: Option<PathBuf>) -> Result<Self> {
        preflight_engine()?;

        let (workspace, catalog) = open_registry(home)?;

        let engine: Arc<dyn ContainerEngine> = Arc::new(
            DockerEngine::connect().context("could not connect to the local container engine")?,
        );
        engine
            .ping()
            .await
            .context("the container engine is not responding; is the Docker daemon running?")?;
        let lifecycle = Arc::new(StandardServiceLifecycle::new(engine));
        let synthesizer = Arc::new(ComposeSynthesizer::new(workspace.clone()));
        let runner: Arc<dyn ComposeRunner> = Arc::new(DockerComposeRunner);

        let manager = Arc::new(StandardServiceManager::new(
            catalog.clone(),
            lifecycle,
            synthesizer,
            runner,
            workspace.clone(),
        ));

        Ok(Self {
            workspace,
            catalog,
            manager,
        })
    }
}

/// Resolve the workspace and load (or seed) the service registry.
///
/// `home` overrides the usual `DECKHAND_HOME` / `~/.deckhand` discovery.
pub fn open_registry(home: Option<PathBuf>) -> Result<(Arc<Workspace>, Arc<Catalog>)> {
    let workspace = match home {
        Some(root) => Workspace::at(root),
        None => Workspace::resolve(),
    }
    .context("could not prepare the deckhand workspace")?;
    debug!("workspace at {}", workspace.root().display());

    let registry = workspace.registry_file();
    let catalog = Catalog::load_or_seed(&registry)
        .with_context(|| format!("could not load the service registry at {}", registry.display()))?;

    Ok((Arc::new(workspace), Arc::new(catalog)))
}

/// Fail fast when the engine tooling is missing instead of surfacing a
/// connect error mid-command.
fn preflight_engine() -> Result<()> {
    which::which("docker")
        .map(|_| ())
        .context("docker was not found on PATH; install Docker (or start Docker Desktop) first")
}
