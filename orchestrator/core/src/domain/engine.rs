// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container engine gateway: the trait every engine-backed component talks
//! through, plus the engine error taxonomy.
//!
//! One gateway value owns one engine connection for the whole process and is
//! safe to share across tasks. Engine failures surface unchanged; nothing at
//! this boundary retries or reinterprets them.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine endpoint is unreachable or the transport failed.
    #[error("container engine unreachable: {0}")]
    Connection(String),

    /// The engine reported the resource as absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The engine refused the operation because the resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Pulling an image failed.
    #[error("image pull failed for {image}: {reason}")]
    Image { image: String, reason: String },

    /// A command executed inside a container failed.
    #[error("exec failed in {container}: {reason}")]
    Exec { container: String, reason: String },

    /// Any other engine API failure, message preserved verbatim.
    #[error("engine API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Descriptors
// ============================================================================

/// Engine-independent view of a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerDescriptor {
    pub id: String,
    pub name: String,
    /// Engine state string, e.g. `running` or `exited`.
    pub state: String,
    pub labels: HashMap<String, String>,
    /// Address on the dev network when attached, else any reported address.
    pub ip_address: Option<String>,
}

/// Engine-independent view of a network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub id: String,
    pub name: String,
}

// ============================================================================
// Requests
// ============================================================================

/// Everything the engine needs to create a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerRequest {
    /// Unique runtime container name.
    pub name: String,
    /// Full image reference, `repository:tag`.
    pub image: String,
    /// Environment in `KEY=VALUE` form.
    pub env: Vec<String>,
    /// Startup command override.
    pub cmd: Option<Vec<String>>,
    pub labels: BTreeMap<String, String>,
    /// Bind mounts in `host:container[:mode]` form.
    pub binds: Vec<String>,
    /// Container TCP ports published 1:1 on all host interfaces.
    pub ports: Vec<u16>,
}

/// Everything the engine needs to create a network.
#[derive(Debug, Clone, Default)]
pub struct NetworkRequest {
    pub name: String,
    pub driver: String,
    pub internal: bool,
    pub attachable: bool,
    pub enable_ipv6: bool,
    pub labels: BTreeMap<String, String>,
}

// ============================================================================
// Gateway Trait
// ============================================================================

/// Primitive operations on the container engine.
///
/// Implementations must be safe for concurrent use; callers fan out over a
/// single shared gateway.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Verify the engine connection is alive.
    async fn ping(&self) -> EngineResult<()>;

    /// Make sure `image_ref` is available locally, pulling it if absent.
    async fn ensure_image(&self, image_ref: &str) -> EngineResult<()>;

    /// Create a container without starting it. Returns the container id.
    async fn create_container(&self, request: &ContainerRequest) -> EngineResult<String>;

    async fn start_container(&self, id: &str) -> EngineResult<()>;

    /// Find the first container matching every `key=value` label filter,
    /// running or not. Absence is `Ok(None)`.
    async fn find_container(
        &self,
        labels: &[(String, String)],
    ) -> EngineResult<Option<ContainerDescriptor>>;

    /// Inspect a container by id or name. Absence is `Ok(None)`.
    async fn inspect_container(
        &self,
        id_or_name: &str,
    ) -> EngineResult<Option<ContainerDescriptor>>;

    /// Force-remove a container together with its anonymous volumes.
    async fn remove_container(&self, id_or_name: &str) -> EngineResult<()>;

    /// Run a command inside a running container and collect its combined
    /// output. A non-zero exit status is an [`EngineError::Exec`].
    async fn exec(
        &self,
        container: &str,
        cmd: &[String],
        user: Option<&str>,
    ) -> EngineResult<String>;

    /// Create a network. Returns the network id.
    async fn create_network(&self, request: &NetworkRequest) -> EngineResult<String>;

    /// Inspect a network by name. Absence is `Ok(None)`.
    async fn inspect_network(&self, name: &str) -> EngineResult<Option<NetworkDescriptor>>;

    /// Attach a container to a network under the given aliases.
    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        aliases: &[String],
    ) -> EngineResult<()>;

    async fn remove_network(&self, name: &str) -> EngineResult<()>;
}
