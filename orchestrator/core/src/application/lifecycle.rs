// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service Lifecycle Application Service
//!
//! Drives one resolved service through the container engine gateway:
//! image pull, container create/start, dev network attachment, label-based
//! discovery, forced teardown and in-container exec.
//!
//! Failure policy is surface-and-stop: a failed step aborts the operation
//! and the engine error comes back unchanged in cause. There is no rollback
//! of already-created resources; the idempotent `destroy` path is the
//! cleanup story.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::engine::{ContainerDescriptor, ContainerEngine, ContainerRequest};
use crate::domain::service::ResolvedService;
use crate::infrastructure::network::DevNetwork;

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Pull, create, start and network-attach a container for the service.
    ///
    /// The runtime container name is the service's base name plus a
    /// nanosecond timestamp so repeated runs never collide.
    async fn run(&self, service: &ResolvedService) -> Result<ContainerDescriptor>;

    /// Find the service's container by its discovery labels. A service
    /// that is not running yet is `Ok(None)`, not an error.
    async fn inspect(&self, service: &ResolvedService) -> Result<Option<ContainerDescriptor>>;

    /// Force-remove the service's container with its volumes. Destroying
    /// an absent service succeeds.
    async fn destroy(&self, service: &ResolvedService) -> Result<()>;

    /// Run a command inside the service's container and collect its
    /// combined output.
    async fn exec(&self, service: &ResolvedService, cmd: &[String]) -> Result<String>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardServiceLifecycle {
    engine: Arc<dyn ContainerEngine>,
    network: DevNetwork,
}

impl StandardServiceLifecycle {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        let network = DevNetwork::new(Arc::clone(&engine));
        Self { engine, network }
    }

    fn request_for(service: &ResolvedService, name: String) -> ContainerRequest {
        ContainerRequest {
            name,
            image: service.image_ref(),
            env: service
                .env()
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect(),
            cmd: service.cmd().map(<[String]>::to_vec),
            labels: service.engine_labels(),
            binds: service
                .bind_mounts()
                .iter()
                .map(|(host, container)| format!("{host}:{container}"))
                .collect(),
            ports: service.ports().to_vec(),
        }
    }
}

#[async_trait]
impl ServiceLifecycle for StandardServiceLifecycle {
    async fn run(&self, service: &ResolvedService) -> Result<ContainerDescriptor> {
        let image = service.image_ref();
        info!("Running service '{}' (image: {})", service.name(), image);

        self.engine
            .ensure_image(&image)
            .await
            .with_context(|| format!("Failed to ensure image {image}"))?;

        let name = format!(
            "{}-{}",
            service.container_base_name(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let request = Self::request_for(service, name.clone());

        let id = self.engine.create_container(&request).await.with_context(|| {
            format!("Failed to create container for service '{}'", service.name())
        })?;

        self.engine
            .start_container(&id)
            .await
            .with_context(|| format!("Failed to start container {name}"))?;

        self.network
            .ensure()
            .await
            .context("Failed to ensure the dev network")?;
        self.network
            .connect(&id, service.network_alias())
            .await
            .with_context(|| {
                format!(
                    "Failed to connect {name} to the dev network as '{}'",
                    service.network_alias()
                )
            })?;

        let descriptor = self
            .engine
            .inspect_container(&id)
            .await
            .with_context(|| format!("Failed to inspect started container {name}"))?
            .with_context(|| format!("Container {name} vanished right after start"))?;

        info!(
            "Service '{}' running (container: {}, id: {})",
            service.name(),
            descriptor.name,
            descriptor.id
        );
        Ok(descriptor)
    }

    async fn inspect(&self, service: &ResolvedService) -> Result<Option<ContainerDescriptor>> {
        debug!("Inspecting service '{}'", service.name());
        self.engine
            .find_container(&service.discovery_labels())
            .await
            .with_context(|| format!("Failed to look up service '{}'", service.name()))
    }

    async fn destroy(&self, service: &ResolvedService) -> Result<()> {
        let Some(descriptor) = self.inspect(service).await? else {
            debug!(
                "No container for service '{}', nothing to destroy",
                service.name()
            );
            return Ok(());
        };

        info!(
            "Destroying service '{}' (container: {})",
            service.name(),
            descriptor.name
        );
        match self.engine.remove_container(&descriptor.id).await {
            Ok(()) => Ok(()),
            // Lost a race against another remover; the goal state holds.
            Err(crate::domain::engine::EngineError::NotFound(_)) => Ok(()),
            Err(error) => Err(error).with_context(|| {
                format!(
                    "Failed to remove container {} for service '{}'",
                    descriptor.name,
                    service.name()
                )
            }),
        }
    }

    async fn exec(&self, service: &ResolvedService, cmd: &[String]) -> Result<String> {
        let descriptor = self
            .inspect(service)
            .await?
            .with_context(|| format!("Service '{}' has no running container", service.name()))?;

        debug!(
            "Executing {:?} in service '{}' (container: {})",
            cmd,
            service.name(),
            descriptor.name
        );
        self.engine
            .exec(&descriptor.id, cmd, None)
            .await
            .with_context(|| format!("Exec failed in service '{}'", service.name()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service::{ServiceSpec, CONTAINER_NAME_LABEL, OWNER, OWNER_LABEL};
    use crate::infrastructure::engine::MockEngine;
    use crate::infrastructure::network::DEV_NETWORK_NAME;

    fn apache() -> ResolvedService {
        ResolvedService::new(ServiceSpec {
            name: "apache".to_string(),
            image: "httpd".to_string(),
            version: "2.4".to_string(),
            ports: vec![80],
            ..Default::default()
        })
    }

    fn lifecycle() -> (StandardServiceLifecycle, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine::new());
        (
            StandardServiceLifecycle::new(engine.clone() as Arc<dyn ContainerEngine>),
            engine,
        )
    }

    #[tokio::test]
    async fn test_run_pulls_creates_starts_and_connects() {
        let (lifecycle, engine) = lifecycle();
        let service = apache();

        let descriptor = lifecycle.run(&service).await.unwrap();

        assert!(descriptor.name.starts_with("apache-2.4-"));
        assert_eq!(descriptor.state, "running");
        assert_eq!(
            descriptor.labels.get(OWNER_LABEL).map(String::as_str),
            Some(OWNER)
        );
        assert_eq!(
            descriptor.labels.get(CONTAINER_NAME_LABEL).map(String::as_str),
            Some("apache-2.4")
        );

        assert_eq!(engine.pulls.lock().as_slice(), ["httpd:2.4"]);
        let connections = engine.connections.lock();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].0, DEV_NETWORK_NAME);
        assert_eq!(connections[0].2, vec!["apache".to_string()]);
    }

    #[tokio::test]
    async fn test_run_surfaces_engine_errors() {
        let (lifecycle, engine) = lifecycle();
        *engine.refuse_creates.lock() = true;

        let error = lifecycle.run(&apache()).await.unwrap_err();
        assert!(format!("{error:#}").contains("create refused"));
        // failed run leaves nothing started
        assert!(engine.containers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_inspect_absent_service_is_none() {
        let (lifecycle, _engine) = lifecycle();
        let found = lifecycle.inspect(&apache()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_inspect_finds_by_discovery_labels() {
        let (lifecycle, _engine) = lifecycle();
        let service = apache();
        lifecycle.run(&service).await.unwrap();

        let found = lifecycle.inspect(&service).await.unwrap().unwrap();
        assert!(found.name.starts_with("apache-2.4-"));

        // same name, different version: not a match
        let mut other = apache();
        other.set_version("2.5");
        assert!(lifecycle.inspect(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (lifecycle, engine) = lifecycle();
        let service = apache();
        lifecycle.run(&service).await.unwrap();

        lifecycle.destroy(&service).await.unwrap();
        assert!(engine.containers.lock().is_empty());

        // second destroy finds nothing and still succeeds
        lifecycle.destroy(&service).await.unwrap();
    }

    #[tokio::test]
    async fn test_exec_requires_a_running_container() {
        let (lifecycle, engine) = lifecycle();
        let service = apache();

        let missing = lifecycle.exec(&service, &["ls".to_string()]).await;
        assert!(missing.is_err());

        lifecycle.run(&service).await.unwrap();
        lifecycle
            .exec(&service, &["ls".to_string(), "/tmp".to_string()])
            .await
            .unwrap();
        assert_eq!(engine.execs.lock().len(), 1);
    }
}
