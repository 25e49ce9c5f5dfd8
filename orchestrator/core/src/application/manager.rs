// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service Manager Application Service
//!
//! The orchestration facade: resolves names into runnable services using
//! the catalog and merge rules, drives single services through the entity
//! lifecycle, fans bulk operations out over the worker pool, and manages
//! stack profiles through the composition synthesizer and tool.
//!
//! Unknown names are explicit results (`Option` from the builders, a typed
//! not-found from the flows), never silent nils. Engine and tool failures
//! pass through with operation context; run-state bookkeeping is
//! best-effort and never fails a flow.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::fanout;
use crate::application::lifecycle::ServiceLifecycle;
use crate::domain::catalog::Catalog;
use crate::domain::engine::ContainerDescriptor;
use crate::domain::service::{ResolvedService, ServiceSpec, OWNER, OWNER_LABEL};
use crate::infrastructure::compose::{ComposeRunner, ComposeSynthesizer};
use crate::infrastructure::state;
use crate::infrastructure::workspace::Workspace;

/// Name of the composite metrics agent, constructed procedurally instead of
/// from the registry.
pub const TELEGRAF: &str = "telegraf";

const TELEGRAF_IMAGE: &str = "telegraf";
const TELEGRAF_VERSION: &str = "1.30";
const TELEGRAF_CONF_TARGET: &str = "/etc/telegraf/telegraf.conf";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("unknown stack: {0}")]
    UnknownStack(String),
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Resolve a registry (or composite) service into a runnable entity.
    /// Unknown names are `None`; callers decide how to surface that.
    fn build(&self, name: &str, version: Option<&str>, daemon: bool) -> Option<ResolvedService>;

    /// Like [`build`](Self::build), then merge `overrides` on top and stamp
    /// the stack key. A name absent from the registry still resolves when
    /// the overrides carry an image of their own.
    fn build_from_config(
        &self,
        name: &str,
        version: Option<&str>,
        daemon: bool,
        overrides: &ServiceSpec,
        stack: Option<&str>,
    ) -> Option<ResolvedService>;

    /// Resolve every member of a stack, overrides merged, stack key set.
    fn resolve_stack(&self, stack: &str, version: Option<&str>) -> Option<Vec<ResolvedService>>;

    /// Run one service through the entity lifecycle.
    async fn run(&self, service: &ResolvedService) -> Result<ContainerDescriptor>;

    /// Destroy one service's container. Absent containers are success.
    async fn stop(&self, service: &ResolvedService) -> Result<()>;

    /// Run many services with bounded parallelism; first failure wins,
    /// nothing in flight is cancelled.
    async fn run_many(&self, services: Vec<ResolvedService>, parallelism: usize) -> Result<()>;

    /// Destroy many services with bounded parallelism.
    async fn stop_many(&self, services: Vec<ResolvedService>, parallelism: usize) -> Result<()>;

    /// Materialize `services` into the stack's profile and drive the
    /// composition tool over the profile's ordered file list.
    async fn add_services_to_compose(
        &self,
        stack: &str,
        services: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Remove `services` from the stack's profile, newest first, skipping
    /// members other services still reference. Tears the profile down when
    /// the last member leaves.
    async fn remove_services_from_compose(
        &self,
        stack: &str,
        services: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Run a command inside one composed member of a stack, collecting its
    /// output.
    async fn exec_in_compose(
        &self,
        stack: &str,
        service: &str,
        cmd: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<String>;

    /// `up -d` over an ordered file list, recording the run snapshot.
    async fn run_compose(
        &self,
        run_id: &str,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// `down --remove-orphans` over an ordered file list, dropping the run
    /// snapshot.
    async fn stop_compose(
        &self,
        run_id: &str,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<()>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardServiceManager {
    catalog: Arc<Catalog>,
    lifecycle: Arc<dyn ServiceLifecycle>,
    synthesizer: Arc<ComposeSynthesizer>,
    runner: Arc<dyn ComposeRunner>,
    workspace: Arc<Workspace>,
}

impl StandardServiceManager {
    pub fn new(
        catalog: Arc<Catalog>,
        lifecycle: Arc<dyn ServiceLifecycle>,
        synthesizer: Arc<ComposeSynthesizer>,
        runner: Arc<dyn ComposeRunner>,
        workspace: Arc<Workspace>,
    ) -> Self {
        Self {
            catalog,
            lifecycle,
            synthesizer,
            runner,
            workspace,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Resolve a stack member: stack overrides when present, otherwise the
    /// plain registry entry, stack key stamped either way.
    fn build_for_stack(&self, stack: &str, name: &str) -> Result<ResolvedService, ManagerError> {
        let overrides = self.catalog.stack(stack).and_then(|s| s.services.get(name));
        let built = match overrides {
            Some(overrides) => self.build_from_config(name, None, true, overrides, Some(stack)),
            None => self.build(name, None, true).map(|mut service| {
                service.set_stack(stack);
                service
            }),
        };
        built.ok_or_else(|| ManagerError::UnknownService(name.to_string()))
    }

    /// A remaining member whose env wiring mentions the candidate's alias
    /// (or name) as a host still needs it; removal of the candidate is
    /// skipped, not failed.
    fn removal_blocker(
        &self,
        stack: &str,
        candidate: &str,
        remaining: &[String],
    ) -> Option<String> {
        let alias = self
            .build_for_stack(stack, candidate)
            .map(|service| service.network_alias().to_string())
            .unwrap_or_else(|_| candidate.to_string());
        for member in remaining {
            let Ok(service) = self.build_for_stack(stack, member) else {
                continue;
            };
            let referenced = service
                .env()
                .values()
                .any(|value| references_host(value, &alias) || references_host(value, candidate));
            if referenced {
                return Some(member.clone());
            }
        }
        None
    }

    fn build_telegraf(&self) -> ResolvedService {
        let mut bind_mounts = BTreeMap::new();
        bind_mounts.insert(DOCKER_SOCKET.to_string(), DOCKER_SOCKET.to_string());
        if let Some(conf) = self.write_telegraf_conf() {
            bind_mounts.insert(conf.display().to_string(), TELEGRAF_CONF_TARGET.to_string());
        }
        ResolvedService::new(ServiceSpec {
            name: TELEGRAF.to_string(),
            image: TELEGRAF_IMAGE.to_string(),
            version: TELEGRAF_VERSION.to_string(),
            bind_mounts,
            ..Default::default()
        })
    }

    /// Synthesize the agent config: watch the engine socket, keep only
    /// containers carrying our ownership label.
    fn write_telegraf_conf(&self) -> Option<PathBuf> {
        let dir = self.workspace.root().join(TELEGRAF);
        let path = dir.join("telegraf.conf");
        let conf = format!(
            "[agent]\n  interval = \"10s\"\n  round_interval = true\n\n\
             [[inputs.docker]]\n  endpoint = \"unix://{DOCKER_SOCKET}\"\n  \
             docker_label_include = [\"{OWNER_LABEL}={OWNER}\"]\n\n\
             [[outputs.file]]\n  files = [\"stdout\"]\n"
        );
        match std::fs::create_dir_all(&dir).and_then(|()| std::fs::write(&path, conf)) {
            Ok(()) => Some(path),
            Err(error) => {
                warn!(
                    "Could not write the telegraf config at {}: {}; running without it",
                    path.display(),
                    error
                );
                None
            }
        }
    }
}

#[async_trait]
impl ServiceManager for StandardServiceManager {
    fn build(&self, name: &str, version: Option<&str>, daemon: bool) -> Option<ResolvedService> {
        let mut service = if name == TELEGRAF {
            self.build_telegraf()
        } else {
            ResolvedService::new(self.catalog.service(name)?.clone())
        };
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            service.set_version(version);
        }
        service.set_as_daemon(daemon);
        debug!(
            "Built service '{}' (image: {}, daemon: {})",
            service.name(),
            service.image_ref(),
            daemon
        );
        Some(service)
    }

    fn build_from_config(
        &self,
        name: &str,
        version: Option<&str>,
        daemon: bool,
        overrides: &ServiceSpec,
        stack: Option<&str>,
    ) -> Option<ResolvedService> {
        let spec = match self.catalog.service(name) {
            Some(base) => {
                let mut merged = base.clone();
                merged.merge_overrides(overrides);
                merged
            }
            None => {
                // Not in the registry: only buildable when the overrides
                // stand on their own.
                if overrides.image.is_empty() {
                    return None;
                }
                let mut spec = overrides.clone();
                spec.name = name.to_string();
                spec
            }
        };

        let mut service = ResolvedService::new(spec);
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            service.set_version(version);
        }
        service.set_as_daemon(daemon);
        if let Some(stack) = stack {
            service.set_stack(stack);
        }
        Some(service)
    }

    fn resolve_stack(&self, stack: &str, version: Option<&str>) -> Option<Vec<ResolvedService>> {
        let stack_spec = self.catalog.stack(stack)?;
        let mut services = Vec::with_capacity(stack_spec.services.len());
        for (name, overrides) in &stack_spec.services {
            match self.build_from_config(name, version, true, overrides, Some(stack)) {
                Some(service) => services.push(service),
                None => warn!(
                    "Stack '{}' member '{}' has no usable definition, skipping",
                    stack, name
                ),
            }
        }
        Some(services)
    }

    async fn run(&self, service: &ResolvedService) -> Result<ContainerDescriptor> {
        self.lifecycle
            .run(service)
            .await
            .with_context(|| format!("Failed to run service '{}'", service.name()))
    }

    async fn stop(&self, service: &ResolvedService) -> Result<()> {
        self.lifecycle
            .destroy(service)
            .await
            .with_context(|| format!("Failed to stop service '{}'", service.name()))
    }

    async fn run_many(&self, services: Vec<ResolvedService>, parallelism: usize) -> Result<()> {
        let lifecycle = Arc::clone(&self.lifecycle);
        fanout::run_pooled(parallelism, services, move |service| {
            let lifecycle = Arc::clone(&lifecycle);
            async move {
                lifecycle
                    .run(&service)
                    .await
                    .map(drop)
                    .with_context(|| format!("Failed to run service '{}'", service.name()))
            }
        })
        .await
    }

    async fn stop_many(&self, services: Vec<ResolvedService>, parallelism: usize) -> Result<()> {
        let lifecycle = Arc::clone(&self.lifecycle);
        fanout::run_pooled(parallelism, services, move |service| {
            let lifecycle = Arc::clone(&lifecycle);
            async move {
                lifecycle
                    .destroy(&service)
                    .await
                    .with_context(|| format!("Failed to stop service '{}'", service.name()))
            }
        })
        .await
    }

    async fn add_services_to_compose(
        &self,
        stack: &str,
        services: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        let base = self
            .resolve_stack(stack, None)
            .ok_or_else(|| ManagerError::UnknownStack(stack.to_string()))?;
        let mut files = self
            .synthesizer
            .ensure_profile(stack, &base)
            .with_context(|| format!("Failed to prepare the '{stack}' profile"))?;

        for name in services {
            let service = self.build_for_stack(stack, name)?;
            files = self
                .synthesizer
                .add_member(stack, &service)
                .with_context(|| format!("Failed to add '{name}' to the '{stack}' profile"))?;
        }

        info!(
            "Deploying {} service(s) to stack '{}'",
            services.len(),
            stack
        );
        self.run_compose(&state::run_id_for_stack(stack), &files, env)
            .await
    }

    async fn remove_services_from_compose(
        &self,
        stack: &str,
        services: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        let members = self
            .synthesizer
            .profile_members(stack)
            .ok_or_else(|| ManagerError::UnknownStack(stack.to_string()))?;

        // newest members leave first
        let mut candidates: Vec<String> = members
            .iter()
            .filter(|member| services.contains(member))
            .cloned()
            .collect();
        candidates.reverse();
        if candidates.is_empty() {
            debug!("Nothing to remove from stack '{}'", stack);
            return Ok(());
        }

        for candidate in candidates {
            let Some(current) = self.synthesizer.profile_members(stack) else {
                break;
            };
            let remaining: Vec<String> = current
                .iter()
                .filter(|member| *member != &candidate)
                .cloned()
                .collect();
            if let Some(blocker) = self.removal_blocker(stack, &candidate, &remaining) {
                warn!(
                    "Service '{}' is still referenced by '{}', leaving it in stack '{}'",
                    candidate, blocker, stack
                );
                continue;
            }

            let files = self
                .synthesizer
                .profile_files(stack)
                .ok_or_else(|| ManagerError::UnknownStack(stack.to_string()))?;
            self.runner
                .rm(&files, env, &candidate)
                .await
                .with_context(|| format!("Failed to remove '{candidate}' from stack '{stack}'"))?;
            let after = self.synthesizer.remove_member(stack, &candidate)?;
            info!("Service '{}' removed from stack '{}'", candidate, stack);

            if after.empty {
                self.runner
                    .down(&after.files, env)
                    .await
                    .with_context(|| format!("Failed to tear down stack '{stack}'"))?;
                self.synthesizer.destroy_profile(stack);
                state::destroy(&state::run_id_for_stack(stack), self.workspace.root());
                info!("Stack '{}' is empty, profile torn down", stack);
                return Ok(());
            }
        }

        if let Some(files) = self.synthesizer.profile_files(stack) {
            state::update(&state::run_id_for_stack(stack), self.workspace.root(), &files, env);
        }
        Ok(())
    }

    async fn exec_in_compose(
        &self,
        stack: &str,
        service: &str,
        cmd: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<String> {
        let files = self
            .synthesizer
            .profile_files(stack)
            .ok_or_else(|| ManagerError::UnknownStack(stack.to_string()))?;
        self.runner
            .exec(&files, env, service, cmd)
            .await
            .with_context(|| format!("Exec failed in '{service}' of stack '{stack}'"))
    }

    async fn run_compose(
        &self,
        run_id: &str,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.runner
            .up(files, env)
            .await
            .with_context(|| format!("Composition run '{run_id}' failed to start"))?;
        counter!("deckhand_compose_runs_total").increment(1);
        state::update(run_id, self.workspace.root(), files, env);
        Ok(())
    }

    async fn stop_compose(
        &self,
        run_id: &str,
        files: &[PathBuf],
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.runner
            .down(files, env)
            .await
            .with_context(|| format!("Composition run '{run_id}' failed to stop"))?;
        state::destroy(run_id, self.workspace.root());
        Ok(())
    }
}

/// True when `value` mentions `host` as a standalone host token, as in
/// `http://elasticsearch:9200` or `user@mysql:3306`, but not as part of a
/// longer name like `elasticsearch-data`.
fn references_host(value: &str, host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    let boundary = |c: Option<char>| {
        c.map_or(true, |c| {
            !c.is_ascii_alphanumeric() && c != '-' && c != '.' && c != '_'
        })
    };
    value.match_indices(host).any(|(idx, matched)| {
        let before = value[..idx].chars().next_back();
        let after = value[idx + matched.len()..].chars().next();
        boundary(before) && boundary(after)
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::lifecycle::StandardServiceLifecycle;
    use crate::domain::engine::ContainerEngine;
    use crate::infrastructure::compose::RecordingComposeRunner;
    use crate::infrastructure::engine::MockEngine;

    fn manager() -> (
        StandardServiceManager,
        Arc<MockEngine>,
        Arc<RecordingComposeRunner>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Arc::new(Workspace::at(dir.path().join("ws")).unwrap());
        let engine = Arc::new(MockEngine::new());
        let lifecycle = Arc::new(StandardServiceLifecycle::new(
            engine.clone() as Arc<dyn ContainerEngine>
        ));
        let synthesizer = Arc::new(ComposeSynthesizer::new(workspace.clone()));
        let runner = Arc::new(RecordingComposeRunner::new());
        let manager = StandardServiceManager::new(
            Arc::new(Catalog::builtin()),
            lifecycle,
            synthesizer,
            runner.clone() as Arc<dyn ComposeRunner>,
            workspace,
        );
        (manager, engine, runner, dir)
    }

    #[test]
    fn test_build_apache_from_clean_registry() {
        let (manager, _, _, _dir) = manager();

        let service = manager.build("apache", Some("2.4"), false).unwrap();

        assert_eq!(service.name(), "apache");
        assert_eq!(service.image_ref(), "httpd:2.4");
        assert!(!service.is_daemon());
    }

    #[test]
    fn test_build_unknown_service_is_none() {
        let (manager, _, _, _dir) = manager();
        assert!(manager.build("no-such-service", None, false).is_none());
    }

    #[test]
    fn test_build_telegraf_composite() {
        let (manager, _, _, _dir) = manager();

        let service = manager.build(TELEGRAF, None, true).unwrap();

        assert_eq!(service.image_ref(), "telegraf:1.30");
        assert!(service.bind_mounts().contains_key(DOCKER_SOCKET));
        let conf_bind = service
            .bind_mounts()
            .iter()
            .find(|(_, target)| target.as_str() == TELEGRAF_CONF_TARGET);
        let (conf_path, _) = conf_bind.unwrap();
        let written = std::fs::read_to_string(conf_path).unwrap();
        assert!(written.contains("inputs.docker"));
        assert!(written.contains(&format!("{OWNER_LABEL}={OWNER}")));
    }

    #[test]
    fn test_build_from_config_merges_and_stamps_stack() {
        let (manager, _, _, _dir) = manager();
        let overrides = ServiceSpec {
            env: BTreeMap::from([("CACHE".to_string(), "on".to_string())]),
            ..Default::default()
        };

        let service = manager
            .build_from_config("redis", Some("7.4"), true, &overrides, Some("web"))
            .unwrap();

        assert_eq!(service.image_ref(), "redis:7.4");
        assert_eq!(service.env().get("CACHE").map(String::as_str), Some("on"));
        assert_eq!(service.stack(), Some("web"));
        assert_eq!(service.container_base_name(), "redis-7.4-web");
    }

    #[test]
    fn test_resolve_stack_applies_member_overrides() {
        let (manager, _, _, _dir) = manager();

        let members = manager.resolve_stack("elastic", None).unwrap();

        assert_eq!(members.len(), 2);
        let kibana = members.iter().find(|s| s.name() == "kibana").unwrap();
        assert_eq!(kibana.stack(), Some("elastic"));
        assert!(kibana
            .env()
            .get("ELASTICSEARCH_HOSTS")
            .is_some_and(|hosts| hosts.contains("elasticsearch")));
    }

    #[tokio::test]
    async fn test_run_and_stop_wrap_the_lifecycle() {
        let (manager, engine, _, _dir) = manager();
        let service = manager.build("redis", None, false).unwrap();

        let descriptor = manager.run(&service).await.unwrap();
        assert!(descriptor.name.starts_with("redis-7.2-"));

        manager.stop(&service).await.unwrap();
        assert!(engine.containers.lock().is_empty());
        // second stop: nothing left, still fine
        manager.stop(&service).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_many_runs_every_member() {
        let (manager, engine, _, _dir) = manager();
        let services = manager.resolve_stack("lamp", None).unwrap();

        manager.run_many(services, 2).await.unwrap();

        assert_eq!(engine.containers.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_add_services_drives_up_over_ordered_files() {
        let (manager, _, runner, _dir) = manager();

        manager
            .add_services_to_compose(
                "lamp",
                &["redis".to_string()],
                &BTreeMap::from([("TAG".to_string(), "dev".to_string())]),
            )
            .await
            .unwrap();

        let calls = runner.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].op, "up");
        assert_eq!(calls[0].files.len(), 2);
        assert!(calls[0].files[0].ends_with("compose/stacks/lamp/docker-compose.yml"));
        assert!(calls[0].files[1].ends_with("compose/services/redis/docker-compose.yml"));
        assert_eq!(calls[0].env.get("TAG").map(String::as_str), Some("dev"));

        let record = state::recover(&state::run_id_for_stack("lamp"), manager.workspace().root());
        assert_eq!(record.stack.as_deref(), Some("lamp"));
        assert_eq!(record.services, vec!["redis".to_string()]);
    }

    #[tokio::test]
    async fn test_add_unknown_stack_is_a_user_error() {
        let (manager, _, _, _dir) = manager();
        let error = manager
            .add_services_to_compose("nope", &[], &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(error.to_string().contains("unknown stack"));
    }

    #[tokio::test]
    async fn test_remove_skips_members_still_referenced() {
        let (manager, _, runner, _dir) = manager();
        let names = vec!["elasticsearch".to_string(), "kibana".to_string()];
        manager
            .add_services_to_compose("elastic", &names, &BTreeMap::new())
            .await
            .unwrap();
        runner.calls.lock().clear();

        // kibana still wires ELASTICSEARCH_HOSTS to it, so nothing happens
        manager
            .remove_services_from_compose(
                "elastic",
                &["elasticsearch".to_string()],
                &BTreeMap::new(),
            )
            .await
            .unwrap();

        assert!(runner.calls.lock().iter().all(|call| call.op != "rm"));
    }

    #[tokio::test]
    async fn test_remove_processes_reverse_order_and_tears_down_when_empty() {
        let (manager, _, runner, _dir) = manager();
        let names = vec!["elasticsearch".to_string(), "kibana".to_string()];
        manager
            .add_services_to_compose("elastic", &names, &BTreeMap::new())
            .await
            .unwrap();
        runner.calls.lock().clear();

        manager
            .remove_services_from_compose("elastic", &names, &BTreeMap::new())
            .await
            .unwrap();

        let calls = runner.calls.lock();
        let ops: Vec<(&str, Option<&str>)> = calls
            .iter()
            .map(|call| (call.op.as_str(), call.service.as_deref()))
            .collect();
        assert_eq!(
            ops,
            vec![
                ("rm", Some("kibana")),
                ("rm", Some("elasticsearch")),
                ("down", None),
            ]
        );

        // profile directory and run snapshot are both gone
        assert!(!manager.workspace().stack_dir("elastic").exists());
        let record = state::recover(
            &state::run_id_for_stack("elastic"),
            manager.workspace().root(),
        );
        assert!(record.stack.is_none());
    }

    #[tokio::test]
    async fn test_exec_in_compose_targets_the_member() {
        let (manager, _, runner, _dir) = manager();
        manager
            .add_services_to_compose("lamp", &["redis".to_string()], &BTreeMap::new())
            .await
            .unwrap();

        let cmd = vec!["redis-cli".to_string(), "ping".to_string()];
        manager
            .exec_in_compose("lamp", "redis", &cmd, &BTreeMap::new())
            .await
            .unwrap();

        let calls = runner.calls.lock();
        let exec = calls.iter().find(|call| call.op == "exec").unwrap();
        assert_eq!(exec.service.as_deref(), Some("redis"));
        assert_eq!(exec.cmd, cmd);
        assert_eq!(exec.files.len(), 2, "runs against the full profile");
    }

    #[tokio::test]
    async fn test_exec_in_unknown_stack_is_a_user_error() {
        let (manager, _, _, _dir) = manager();
        let error = manager
            .exec_in_compose("nope", "redis", &[], &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(error.to_string().contains("unknown stack"));
    }

    #[tokio::test]
    async fn test_stop_compose_drops_the_snapshot() {
        let (manager, _, runner, _dir) = manager();
        let file = manager.workspace().service_compose_file("redis");
        let env = BTreeMap::from([("A".to_string(), "1".to_string())]);

        let run_id = state::run_id_for_service("redis");
        manager
            .run_compose(&run_id, std::slice::from_ref(&file), &env)
            .await
            .unwrap();
        let record = state::recover(&run_id, manager.workspace().root());
        assert_eq!(record.services, vec!["redis".to_string()]);
        assert_eq!(record.env, env);

        manager
            .stop_compose(&run_id, std::slice::from_ref(&file), &env)
            .await
            .unwrap();
        assert!(runner.calls.lock().iter().any(|call| call.op == "down"));
        let recovered = state::recover(&run_id, manager.workspace().root());
        assert!(recovered.services.is_empty());
    }

    #[test]
    fn test_references_host_token_boundaries() {
        assert!(references_host("http://elasticsearch:9200", "elasticsearch"));
        assert!(references_host("mysql://root@mysql:3306/db", "mysql"));
        assert!(!references_host(
            "http://elasticsearch-data:9200",
            "elasticsearch"
        ));
        assert!(!references_host("notelasticsearch", "elasticsearch"));
        assert!(!references_host("anything", ""));
    }
}
