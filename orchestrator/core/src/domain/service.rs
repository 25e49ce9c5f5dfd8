// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service specifications and the resolved, runnable service entity.
//!
//! A [`ServiceSpec`] is the declarative catalog form of a service; a
//! [`ResolvedService`] is the fully merged description that the lifecycle
//! layer turns into a container. Resolved services are never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Labels
// ============================================================================

/// Label key marking a container as managed by this tool.
pub const OWNER_LABEL: &str = "service.owner";

/// Fixed value of [`OWNER_LABEL`] on every managed resource.
pub const OWNER: &str = "deckhand";

/// Label key carrying the `<name>-<version>` discovery identity.
pub const CONTAINER_NAME_LABEL: &str = "service.container.name";

// ============================================================================
// Value Objects
// ============================================================================

/// Readiness strategy a caller's waiters consult after `run`.
///
/// The lifecycle itself never blocks on readiness; it starts the container
/// and returns. Waiting and retrying belong to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    /// Do not wait at all.
    None,
    /// Wait until the engine reports the container as running.
    #[default]
    Running,
    /// Wait until the image's healthcheck reports healthy.
    Healthy,
}

/// Informational build provenance for a service image.
///
/// Carried through merges and listings; never interpreted at run time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

// ============================================================================
// Service Specification
// ============================================================================

/// Declarative description of a service as it appears in the registry file.
///
/// All fields are optional in the file; absent fields keep their defaults so
/// a stack override spec can name only the fields it changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name. Derived from the registry map key, never from the file.
    #[serde(skip)]
    pub name: String,

    /// Image repository, e.g. `httpd`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Default image tag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Run detached in the background.
    #[serde(default)]
    pub daemon: bool,

    /// Ordered container ports published 1:1 on the host.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,

    /// Environment presented to the container.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Extra container labels; the ownership labels are always added on top.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Host path -> container path bind mounts. The container path may carry
    /// a `:ro`/`:rw` mode suffix.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bind_mounts: BTreeMap<String, String>,

    /// Alias under which the service is reachable on the dev network.
    /// Falls back to the service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_alias: Option<String>,

    /// Explicit container name, replacing the `<name>-<version>` base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Startup command override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,

    /// Build provenance, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildMetadata>,

    /// Readiness strategy for callers that wait.
    #[serde(default, skip_serializing_if = "wait_is_default")]
    pub wait_strategy: WaitStrategy,
}

impl ServiceSpec {
    /// Merge an override spec into this one, field by field.
    ///
    /// Override wins: set scalars replace, non-empty collections replace,
    /// env merges per key. Unset override fields leave the defaults in
    /// place, and merging the same overrides twice is a no-op.
    pub fn merge_overrides(&mut self, overrides: &ServiceSpec) {
        if !overrides.image.is_empty() {
            self.image = overrides.image.clone();
        }
        if !overrides.version.is_empty() {
            self.version = overrides.version.clone();
        }
        // A bool has no unset form: only an explicit `true` overrides.
        if overrides.daemon {
            self.daemon = true;
        }
        if !overrides.ports.is_empty() {
            self.ports = overrides.ports.clone();
        }
        for (key, value) in &overrides.env {
            self.env.insert(key.clone(), value.clone());
        }
        for (key, value) in &overrides.labels {
            self.labels.insert(key.clone(), value.clone());
        }
        for (host, container) in &overrides.bind_mounts {
            self.bind_mounts.insert(host.clone(), container.clone());
        }
        if let Some(alias) = &overrides.network_alias {
            self.network_alias = Some(alias.clone());
        }
        if let Some(name) = &overrides.container_name {
            self.container_name = Some(name.clone());
        }
        if let Some(cmd) = &overrides.cmd {
            self.cmd = Some(cmd.clone());
        }
        if let Some(build) = &overrides.build {
            self.build = Some(build.clone());
        }
        if overrides.wait_strategy != WaitStrategy::default() {
            self.wait_strategy = overrides.wait_strategy;
        }
    }
}

fn wait_is_default(strategy: &WaitStrategy) -> bool {
    *strategy == WaitStrategy::default()
}

// ============================================================================
// Resolved Service
// ============================================================================

/// A fully merged, runnable service description.
///
/// Built by the manager from a catalog spec plus any stack overrides and
/// caller mutations. Carries the stack key when the service runs as part of
/// a stack so that container names stay unique across stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    spec: ServiceSpec,
    stack: Option<String>,
}

impl ResolvedService {
    pub fn new(spec: ServiceSpec) -> Self {
        Self { spec, stack: None }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn version(&self) -> &str {
        &self.spec.version
    }

    pub fn is_daemon(&self) -> bool {
        self.spec.daemon
    }

    pub fn ports(&self) -> &[u16] {
        &self.spec.ports
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.spec.env
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.spec.labels
    }

    pub fn bind_mounts(&self) -> &BTreeMap<String, String> {
        &self.spec.bind_mounts
    }

    pub fn cmd(&self) -> Option<&[String]> {
        self.spec.cmd.as_deref()
    }

    pub fn build_metadata(&self) -> Option<&BuildMetadata> {
        self.spec.build.as_ref()
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.spec.wait_strategy
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Full image reference, `image:version`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.spec.image, self.spec.version)
    }

    /// Alias under which the service is reachable on the dev network.
    pub fn network_alias(&self) -> &str {
        self.spec
            .network_alias
            .as_deref()
            .unwrap_or(&self.spec.name)
    }

    /// Stable container name base: `<name>-<version>`, extended with the
    /// stack key when running inside a stack. An explicit container-name
    /// override replaces the `<name>-<version>` part.
    pub fn container_base_name(&self) -> String {
        let base = match &self.spec.container_name {
            Some(explicit) => explicit.clone(),
            None => format!("{}-{}", self.spec.name, self.spec.version),
        };
        match &self.stack {
            Some(stack) => format!("{base}-{stack}"),
            None => base,
        }
    }

    /// Discovery identity stored in [`CONTAINER_NAME_LABEL`]. Intentionally
    /// excludes the stack key and any container-name override so that
    /// inspect-by-label finds the service under its catalog identity.
    pub fn discovery_name(&self) -> String {
        format!("{}-{}", self.spec.name, self.spec.version)
    }

    /// The two mandatory label filters used to find this service's container.
    pub fn discovery_labels(&self) -> Vec<(String, String)> {
        vec![
            (OWNER_LABEL.to_string(), OWNER.to_string()),
            (CONTAINER_NAME_LABEL.to_string(), self.discovery_name()),
        ]
    }

    /// User labels with the mandatory ownership labels merged on top.
    pub fn engine_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.spec.labels.clone();
        labels.insert(OWNER_LABEL.to_string(), OWNER.to_string());
        labels.insert(CONTAINER_NAME_LABEL.to_string(), self.discovery_name());
        labels
    }

    /// Positional lookup into the ordered exposed ports, as a string.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; callers index ports they declared.
    pub fn exposed_port(&self, index: usize) -> String {
        self.spec.ports[index].to_string()
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.spec.version = version.into();
    }

    pub fn set_as_daemon(&mut self, daemon: bool) {
        self.spec.daemon = daemon;
    }

    /// Merge the given variables into the environment; override wins per
    /// key, existing keys that are not named stay untouched.
    pub fn set_env(&mut self, env: BTreeMap<String, String>) {
        for (key, value) in env {
            self.spec.env.insert(key, value);
        }
    }

    /// Replace the label set. Ownership labels are reapplied at run time.
    pub fn set_labels(&mut self, labels: BTreeMap<String, String>) {
        self.spec.labels = labels;
    }

    /// Replace the bind mount set.
    pub fn set_bind_mounts(&mut self, bind_mounts: BTreeMap<String, String>) {
        self.spec.bind_mounts = bind_mounts;
    }

    pub fn set_network_alias(&mut self, alias: impl Into<String>) {
        self.spec.network_alias = Some(alias.into());
    }

    pub fn set_container_name(&mut self, name: impl Into<String>) {
        self.spec.container_name = Some(name.into());
    }

    pub fn set_cmd(&mut self, cmd: Vec<String>) {
        self.spec.cmd = Some(cmd);
    }

    pub fn set_wait_strategy(&mut self, strategy: WaitStrategy) {
        self.spec.wait_strategy = strategy;
    }

    pub fn set_stack(&mut self, stack: impl Into<String>) {
        self.stack = Some(stack.into());
    }
}

// ============================================================================
// Tests
// ============================================================================
