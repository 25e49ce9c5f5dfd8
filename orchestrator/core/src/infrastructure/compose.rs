// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Composition definitions, stack profiles, and the external composition
//! tool.
//!
//! Services and stacks are materialized as plain `docker-compose.yml` files
//! under the workspace, then driven through the `docker compose` plugin with
//! an ordered list of `-f` flags. Emission is byte-for-byte deterministic
//! for the same input, so repeated materialization never churns files.
//!
//! Profiles (one per stack) track which member services have been added on
//! top of the stack's base definition. Membership survives process restarts
//! through the run-state snapshots; the in-memory registry is only a cache.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::domain::service::ResolvedService;
use crate::infrastructure::state;
use crate::infrastructure::workspace::Workspace;

/// Schema version the local composition tool is known to accept. Legacy
/// `2.x` declarations in synced files are rewritten to this.
pub const SUPPORTED_SCHEMA_VERSION: &str = "3.9";

const COMPOSE_PROGRAM: &str = "docker";
const COMPOSE_SUBCOMMAND: &str = "compose";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("composition file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("composition definition is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to launch the composition tool: {0}")]
    Spawn(std::io::Error),

    #[error("composition tool failed (exit code {code}): {stderr}")]
    Tool { code: i32, stderr: String },

    #[error("unknown composition target: {0}")]
    UnknownProfile(String),
}

// ============================================================================
// Definition Model
// ============================================================================

/// The subset of the composition schema this tool emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeDefinition {
    pub version: String,
    #[serde(default)]
    pub services: BTreeMap<String, ComposeEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

fn compose_entry(service: &ResolvedService) -> ComposeEntry {
    ComposeEntry {
        image: Some(service.image_ref()),
        ports: service
            .ports()
            .iter()
            .map(|port| format!("{port}:{port}"))
            .collect(),
        environment: service.env().clone(),
        labels: service.engine_labels(),
        volumes: service
            .bind_mounts()
            .iter()
            .map(|(host, container)| format!("{host}:{container}"))
            .collect(),
        command: service.cmd().map(<[String]>::to_vec),
    }
}

/// One definition holding every given service, keyed by service name.
pub fn definition_for(services: &[ResolvedService]) -> ComposeDefinition {
    let mut entries = BTreeMap::new();
    for service in services {
        entries.insert(service.name().to_string(), compose_entry(service));
    }
    ComposeDefinition {
        version: SUPPORTED_SCHEMA_VERSION.to_string(),
        services: entries,
    }
}

// ============================================================================
// Sanitization
// ============================================================================

/// Deterministically rewrite an externally sourced definition so the local
/// tool accepts it: force the supported schema version and strip `build:`
/// blocks so runs are image-only. Same input, same output, always.
pub fn sanitize(input: &str) -> Result<String, ComposeError> {
    let mut doc: serde_yaml::Value = serde_yaml::from_str(input)?;
    if let Some(root) = doc.as_mapping_mut() {
        root.insert(
            serde_yaml::Value::from("version"),
            serde_yaml::Value::from(SUPPORTED_SCHEMA_VERSION),
        );
    }
    if let Some(services) = doc
        .get_mut("services")
        .and_then(serde_yaml::Value::as_mapping_mut)
    {
        for (_, entry) in services.iter_mut() {
            if let Some(mapping) = entry.as_mapping_mut() {
                mapping.remove("build");
            }
        }
    }
    Ok(serde_yaml::to_string(&doc)?)
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone)]
struct ProfileMember {
    name: String,
    file: PathBuf,
}

/// A stack's composition aggregate: the base definition plus the member
/// services added on top, in addition order.
#[derive(Debug, Clone)]
pub struct CompositionProfile {
    name: String,
    base_file: PathBuf,
    members: Vec<ProfileMember>,
}

impl CompositionProfile {
    /// Ordered `-f` file list: the base definition first, then each member.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.base_file.clone()];
        files.extend(self.members.iter().map(|member| member.file.clone()));
        files
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|member| member.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Outcome of removing a member from a profile.
#[derive(Debug, Clone)]
pub struct ProfileState {
    pub files: Vec<PathBuf>,
    pub empty: bool,
}

// ============================================================================
// Synthesizer
// ============================================================================

pub struct ComposeSynthesizer {
    workspace: Arc<Workspace>,
    profiles: Mutex<BTreeMap<String, CompositionProfile>>,
}

impl ComposeSynthesizer {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            profiles: Mutex::new(BTreeMap::new()),
        }
    }

    /// Write the definition file for a single service and return its path.
    pub fn materialize_service(&self, service: &ResolvedService) -> Result<PathBuf, ComposeError> {
        let path = self.workspace.service_compose_file(service.name());
        write_definition(&path, &definition_for(std::slice::from_ref(service)))?;
        Ok(path)
    }

    /// Make sure the profile for `stack` exists and return its ordered file
    /// list.
    ///
    /// A missing base definition is synthesized from the stack's resolved
    /// members; an existing one is treated as authoritative and only
    /// sanitized.
    pub fn ensure_profile(
        &self,
        stack: &str,
        base: &[ResolvedService],
    ) -> Result<Vec<PathBuf>, ComposeError> {
        let base_file = self.workspace.stack_compose_file(stack);
        if base_file.exists() {
            sanitize_file(&base_file)?;
        } else {
            write_definition(&base_file, &definition_for(base))?;
            info!(stack = %stack, path = %base_file.display(), "stack definition synthesized");
        }

        let mut profiles = self.profiles.lock();
        self.hydrate_locked(&mut profiles, stack);
        let profile = profiles
            .entry(stack.to_string())
            .or_insert_with(|| CompositionProfile {
                name: stack.to_string(),
                base_file,
                members: Vec::new(),
            });
        Ok(profile.files())
    }

    /// Materialize `service` and add it to the profile. Adding a member
    /// that is already present is a no-op, so adds of disjoint sets commute.
    pub fn add_member(
        &self,
        stack: &str,
        service: &ResolvedService,
    ) -> Result<Vec<PathBuf>, ComposeError> {
        let file = self.materialize_service(service)?;

        let mut profiles = self.profiles.lock();
        self.hydrate_locked(&mut profiles, stack);
        let profile = profiles
            .get_mut(stack)
            .ok_or_else(|| ComposeError::UnknownProfile(stack.to_string()))?;
        if profile.members.iter().any(|m| m.name == service.name()) {
            debug!(stack = %stack, service = %service.name(), "member already in profile");
        } else {
            profile.members.push(ProfileMember {
                name: service.name().to_string(),
                file,
            });
        }
        Ok(profile.files())
    }

    /// Drop a member from the profile. Removing an absent member is a
    /// no-op, so removals of disjoint sets commute too.
    pub fn remove_member(&self, stack: &str, member: &str) -> Result<ProfileState, ComposeError> {
        let mut profiles = self.profiles.lock();
        self.hydrate_locked(&mut profiles, stack);
        let profile = profiles
            .get_mut(stack)
            .ok_or_else(|| ComposeError::UnknownProfile(stack.to_string()))?;
        profile.members.retain(|m| m.name != member);
        Ok(ProfileState {
            files: profile.files(),
            empty: profile.is_empty(),
        })
    }

    /// Current member names of a profile, in addition order.
    pub fn profile_members(&self, stack: &str) -> Option<Vec<String>> {
        let mut profiles = self.profiles.lock();
        self.hydrate_locked(&mut profiles, stack);
        profiles.get(stack).map(CompositionProfile::member_names)
    }

    /// Ordered file list of a profile, if it exists.
    pub fn profile_files(&self, stack: &str) -> Option<Vec<PathBuf>> {
        let mut profiles = self.profiles.lock();
        self.hydrate_locked(&mut profiles, stack);
        profiles.get(stack).map(CompositionProfile::files)
    }

    /// Tear down the profile's files and forget it. Called once the last
    /// member is gone; file removal is best-effort.
    pub fn destroy_profile(&self, stack: &str) {
        let mut profiles = self.profiles.lock();
        profiles.remove(stack);
        drop(profiles);

        let dir = self.workspace.stack_dir(stack);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => info!(stack = %stack, "profile destroyed"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(stack = %stack, path = %dir.display(), error = %error, "profile teardown left files behind");
            }
        }
    }

    /// Rebuild a profile from its run-state snapshot after a restart. The
    /// snapshot records member names in addition order; the file layout is
    /// derived from the workspace conventions.
    fn hydrate_locked(&self, profiles: &mut BTreeMap<String, CompositionProfile>, stack: &str) {
        if profiles.contains_key(stack) {
            return;
        }
        let record = state::recover(&state::run_id_for_stack(stack), self.workspace.root());
        if record.stack.as_deref() != Some(stack) {
            return;
        }
        let base_file = self.workspace.stack_compose_file(stack);
        if !base_file.exists() {
            return;
        }
        let members = record
            .services
            .iter()
            .map(|name| ProfileMember {
                name: name.clone(),
                file: self.workspace.service_compose_file(name),
            })
            .collect();
        debug!(stack = %stack, "profile rebuilt from run-state snapshot");
        profiles.insert(
            stack.to_string(),
            CompositionProfile {
                name: stack.to_string(),
                base_file,
                members,
            },
        );
    }
}

fn write_definition(path: &Path, definition: &ComposeDefinition) -> Result<(), ComposeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ComposeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let raw = serde_yaml::to_string(definition)?;
    std::fs::write(path, raw).map_err(|source| ComposeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Sanitize a definition file in place, leaving it untouched when already
/// clean.
pub fn sanitize_file(path: &Path) -> Result<(), ComposeError> {
    let original = std::fs::read_to_string(path).map_err(|source| ComposeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let sanitized = sanitize(&original)?;
    if sanitized != original {
        std::fs::write(path, &sanitized).map_err(|source| ComposeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "definition sanitized");
    }
    Ok(())
}

// ============================================================================
// Tool Invocation
// ============================================================================

/// Boundary to the external composition tool. The standard implementation
/// shells out to the `docker compose` plugin; tests record invocations
/// instead.
#[async_trait::async_trait]
pub trait ComposeRunner: Send + Sync {
    async fn up(&self, files: &[PathBuf], env: &BTreeMap<String, String>)
        -> Result<(), ComposeError>;

    async fn down(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<(), ComposeError>;

    async fn rm(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
        service: &str,
    ) -> Result<(), ComposeError>;

    async fn exec(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
        service: &str,
        cmd: &[String],
    ) -> Result<String, ComposeError>;

    async fn logs(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<String, ComposeError>;

    async fn config(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<String, ComposeError>;
}

/// Runner backed by the real `docker compose` plugin.
pub struct DockerComposeRunner;

#[async_trait::async_trait]
impl ComposeRunner for DockerComposeRunner {
    async fn up(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<(), ComposeError> {
        ComposeCommand::new(files.to_vec(), env.clone()).up().await
    }

    async fn down(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<(), ComposeError> {
        ComposeCommand::new(files.to_vec(), env.clone()).down().await
    }

    async fn rm(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
        service: &str,
    ) -> Result<(), ComposeError> {
        ComposeCommand::new(files.to_vec(), env.clone())
            .rm(service)
            .await
    }

    async fn exec(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
        service: &str,
        cmd: &[String],
    ) -> Result<String, ComposeError> {
        ComposeCommand::new(files.to_vec(), env.clone())
            .exec(service, cmd)
            .await
    }

    async fn logs(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<String, ComposeError> {
        ComposeCommand::new(files.to_vec(), env.clone()).logs().await
    }

    async fn config(
        &self,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<String, ComposeError> {
        ComposeCommand::new(files.to_vec(), env.clone())
            .config()
            .await
    }
}

// Re-export the recording runner for tests
pub use recording::{ComposeInvocation, RecordingComposeRunner};

mod recording {
    use super::*;

    /// One recorded composition tool call.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ComposeInvocation {
        pub op: String,
        pub files: Vec<PathBuf>,
        pub service: Option<String>,
        pub cmd: Vec<String>,
        pub env: BTreeMap<String, String>,
    }

    /// In-memory [`ComposeRunner`] for tests; never touches the tool.
    #[derive(Default)]
    pub struct RecordingComposeRunner {
        pub calls: Arc<Mutex<Vec<ComposeInvocation>>>,
    }

    impl RecordingComposeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        fn record(
            &self,
            op: &str,
            files: &[PathBuf],
            env: &BTreeMap<String, String>,
            service: Option<&str>,
            cmd: &[String],
        ) {
            self.calls.lock().push(ComposeInvocation {
                op: op.to_string(),
                files: files.to_vec(),
                service: service.map(str::to_string),
                cmd: cmd.to_vec(),
                env: env.clone(),
            });
        }
    }

    #[async_trait::async_trait]
    impl ComposeRunner for RecordingComposeRunner {
        async fn up(
            &self,
            files: &[PathBuf],
            env: &BTreeMap<String, String>,
        ) -> Result<(), ComposeError> {
            self.record("up", files, env, None, &[]);
            Ok(())
        }

        async fn down(
            &self,
            files: &[PathBuf],
            env: &BTreeMap<String, String>,
        ) -> Result<(), ComposeError> {
            self.record("down", files, env, None, &[]);
            Ok(())
        }

        async fn rm(
            &self,
            files: &[PathBuf],
            env: &BTreeMap<String, String>,
            service: &str,
        ) -> Result<(), ComposeError> {
            self.record("rm", files, env, Some(service), &[]);
            Ok(())
        }

        async fn exec(
            &self,
            files: &[PathBuf],
            env: &BTreeMap<String, String>,
            service: &str,
            cmd: &[String],
        ) -> Result<String, ComposeError> {
            self.record("exec", files, env, Some(service), cmd);
            Ok(String::new())
        }

        async fn logs(
            &self,
            files: &[PathBuf],
            env: &BTreeMap<String, String>,
        ) -> Result<String, ComposeError> {
            self.record("logs", files, env, None, &[]);
            Ok(String::new())
        }

        async fn config(
            &self,
            files: &[PathBuf],
            env: &BTreeMap<String, String>,
        ) -> Result<String, ComposeError> {
            self.record("config", files, env, None, &[]);
            Ok(String::new())
        }
    }
}

/// One invocation target for the composition tool: an ordered file list and
/// the environment overlay the tool runs with.
pub struct ComposeCommand {
    files: Vec<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ComposeCommand {
    pub fn new(files: Vec<PathBuf>, env: BTreeMap<String, String>) -> Self {
        Self { files, env }
    }

    /// `up -d`: create and start everything in the file list.
    pub async fn up(&self) -> Result<(), ComposeError> {
        self.run(&["up", "-d"]).await.map(drop)
    }

    /// `down --remove-orphans`: stop and remove the whole run.
    pub async fn down(&self) -> Result<(), ComposeError> {
        self.run(&["down", "--remove-orphans"]).await.map(drop)
    }

    /// `rm -f -s -v <service>`: stop and remove one service with its
    /// anonymous volumes.
    pub async fn rm(&self, service: &str) -> Result<(), ComposeError> {
        self.run(&["rm", "-f", "-s", "-v", service]).await.map(drop)
    }

    /// `exec -T <service> <cmd...>`: run a command inside a composed
    /// service without a TTY, collecting its output.
    pub async fn exec(&self, service: &str, cmd: &[String]) -> Result<String, ComposeError> {
        let mut args: Vec<&str> = vec!["exec", "-T", service];
        args.extend(cmd.iter().map(String::as_str));
        self.run(&args).await
    }

    /// `logs --no-color`: collected log output of the run.
    pub async fn logs(&self) -> Result<String, ComposeError> {
        self.run(&["logs", "--no-color"]).await
    }

    /// `config`: the merged, validated definition. Used to check a file
    /// list before driving it.
    pub async fn config(&self) -> Result<String, ComposeError> {
        self.run(&["config"]).await
    }

    async fn run(&self, args: &[&str]) -> Result<String, ComposeError> {
        let mut command = Command::new(COMPOSE_PROGRAM);
        command.arg(COMPOSE_SUBCOMMAND);
        for file in &self.files {
            command.arg("-f").arg(file);
        }
        command.args(args);
        command.envs(&self.env);
        command.stdin(Stdio::null());

        debug!(
            subcommand = args.first().copied().unwrap_or_default(),
            files = self.files.len(),
            "invoking composition tool"
        );
        let output = command.output().await.map_err(ComposeError::Spawn)?;
        if !output.status.success() {
            return Err(ComposeError::Tool {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ============================================================================
// Tests
// ============================================================================
