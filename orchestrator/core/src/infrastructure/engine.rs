// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Docker implementation of the container engine gateway.
//!
//! One [`DockerEngine`] owns one client connection for the whole process.
//! `bollard` multiplexes requests over it, so the gateway is shared via
//! `Arc` with no additional locking.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, EndpointSettings, HostConfig, PortBinding, PortMap,
};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use futures::StreamExt;
use metrics::counter;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::domain::engine::{
    ContainerDescriptor, ContainerEngine, ContainerRequest, EngineError, EngineResult,
    NetworkDescriptor, NetworkRequest,
};
use crate::infrastructure::network::DEV_NETWORK_NAME;

// ============================================================================
// Gateway
// ============================================================================

pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect with the platform defaults, honoring `DOCKER_HOST`.
    pub fn connect() -> EngineResult<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            EngineError::Connection(format!("{e}; is the docker daemon running?"))
        })?;
        Ok(Self { docker })
    }
}

fn map_engine_err(error: bollard::errors::Error) -> EngineError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        } => EngineError::NotFound(message),
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message,
        } => EngineError::Conflict(message),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => EngineError::Api {
            status: status_code,
            message,
        },
        other => EngineError::Connection(other.to_string()),
    }
}

/// Identity port bindings: container port N listens on `0.0.0.0:N`.
fn port_bindings(ports: &[u16]) -> (HashMap<String, HashMap<(), ()>>, PortMap) {
    let mut exposed = HashMap::new();
    let mut bindings: PortMap = HashMap::new();
    for port in ports {
        let key = format!("{port}/tcp");
        exposed.insert(key.clone(), HashMap::new());
        bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(port.to_string()),
            }]),
        );
    }
    (exposed, bindings)
}

fn summary_to_descriptor(summary: ContainerSummary) -> ContainerDescriptor {
    let name = summary
        .names
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    let ip_address = summary
        .network_settings
        .and_then(|settings| settings.networks)
        .and_then(pick_ip_address);
    ContainerDescriptor {
        id: summary.id.unwrap_or_default(),
        name,
        state: summary.state.unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
        ip_address,
    }
}

fn inspect_to_descriptor(inspect: ContainerInspectResponse) -> ContainerDescriptor {
    let state = inspect
        .state
        .and_then(|s| s.status)
        .map(|s| s.to_string())
        .unwrap_or_default();
    let labels = inspect
        .config
        .and_then(|c| c.labels)
        .unwrap_or_default();
    let ip_address = inspect
        .network_settings
        .and_then(|settings| settings.networks)
        .and_then(pick_ip_address);
    ContainerDescriptor {
        id: inspect.id.unwrap_or_default(),
        name: inspect
            .name
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        state,
        labels,
        ip_address,
    }
}

/// Prefer the dev network address; otherwise take the first attached network
/// in name order so the choice is stable.
fn pick_ip_address(networks: HashMap<String, EndpointSettings>) -> Option<String> {
    if let Some(endpoint) = networks.get(DEV_NETWORK_NAME) {
        if let Some(ip) = endpoint.ip_address.clone().filter(|ip| !ip.is_empty()) {
            return Some(ip);
        }
    }
    let mut names: Vec<&String> = networks.keys().collect();
    names.sort();
    for name in names {
        if let Some(ip) = networks[name].ip_address.clone().filter(|ip| !ip.is_empty()) {
            return Some(ip);
        }
    }
    None
}

// ============================================================================
// ContainerEngine Implementation
// ============================================================================

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> EngineResult<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Connection(e.to_string()))
    }

    async fn ensure_image(&self, image_ref: &str) -> EngineResult<()> {
        match self.docker.inspect_image(image_ref).await {
            Ok(_) => return Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(map_engine_err(e)),
        }

        info!(image = image_ref, "image not present, pulling");
        let options = CreateImageOptions {
            from_image: image_ref.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            match progress {
                Ok(update) => {
                    if let Some(status) = update.status {
                        debug!(image = image_ref, status = %status, "pull progress");
                    }
                }
                Err(e) => {
                    return Err(EngineError::Image {
                        image: image_ref.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
        counter!("deckhand_engine_images_pulled_total").increment(1);
        info!(image = image_ref, "image pulled");
        Ok(())
    }

    async fn create_container(&self, request: &ContainerRequest) -> EngineResult<String> {
        let (exposed, bindings) = port_bindings(&request.ports);
        let host_config = HostConfig {
            binds: (!request.binds.is_empty()).then(|| request.binds.clone()),
            port_bindings: (!bindings.is_empty()).then_some(bindings),
            ..Default::default()
        };
        let labels: HashMap<String, String> = request
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let config = Config {
            image: Some(request.image.clone()),
            env: Some(request.env.clone()),
            cmd: request.cmd.clone(),
            labels: Some(labels),
            exposed_ports: (!exposed.is_empty()).then_some(exposed),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: request.name.clone(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(map_engine_err)?;
        for warning in &created.warnings {
            warn!(container = %request.name, warning = %warning, "engine warning on create");
        }
        counter!("deckhand_engine_containers_created_total").increment(1);
        debug!(container = %request.name, id = %created.id, "container created");
        Ok(created.id)
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_engine_err)
    }

    async fn find_container(
        &self,
        labels: &[(String, String)],
    ) -> EngineResult<Option<ContainerDescriptor>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            labels.iter().map(|(k, v)| format!("{k}={v}")).collect(),
        );
        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(map_engine_err)?;
        Ok(summaries.into_iter().next().map(summary_to_descriptor))
    }

    async fn inspect_container(
        &self,
        id_or_name: &str,
    ) -> EngineResult<Option<ContainerDescriptor>> {
        match self
            .docker
            .inspect_container(id_or_name, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => Ok(Some(inspect_to_descriptor(inspect))),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(map_engine_err(e)),
        }
    }

    async fn remove_container(&self, id_or_name: &str) -> EngineResult<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id_or_name, Some(options))
            .await
            .map_err(map_engine_err)?;
        counter!("deckhand_engine_containers_removed_total").increment(1);
        debug!(container = %id_or_name, "container removed");
        Ok(())
    }

    async fn exec(
        &self,
        container: &str,
        cmd: &[String],
        user: Option<&str>,
    ) -> EngineResult<String> {
        let options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(cmd.to_vec()),
            user: user.map(str::to_string),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(container, options)
            .await
            .map_err(map_engine_err)?;

        let started = self
            .docker
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_engine_err)?;

        let mut collected = String::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(LogOutput::StdOut { message })
                    | Ok(LogOutput::StdErr { message })
                    | Ok(LogOutput::Console { message }) => {
                        collected.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(EngineError::Exec {
                            container: container.to_string(),
                            reason: e.to_string(),
                        })
                    }
                }
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(map_engine_err)?;
        if let Some(code) = inspect.exit_code {
            if code != 0 {
                return Err(EngineError::Exec {
                    container: container.to_string(),
                    reason: format!("exit status {code}: {}", collected.trim()),
                });
            }
        }
        counter!("deckhand_engine_execs_total").increment(1);
        Ok(collected)
    }

    async fn create_network(&self, request: &NetworkRequest) -> EngineResult<String> {
        let options = CreateNetworkOptions {
            name: request.name.clone(),
            check_duplicate: true,
            driver: request.driver.clone(),
            internal: request.internal,
            attachable: request.attachable,
            enable_ipv6: request.enable_ipv6,
            labels: request
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            ..Default::default()
        };
        let created = self
            .docker
            .create_network(options)
            .await
            .map_err(map_engine_err)?;
        if !created.warning.is_empty() {
            warn!(network = %request.name, warning = %created.warning, "engine warning on network create");
        }
        counter!("deckhand_engine_networks_created_total").increment(1);
        Ok(created.id)
    }

    async fn inspect_network(&self, name: &str) -> EngineResult<Option<NetworkDescriptor>> {
        let options = InspectNetworkOptions::<String> {
            verbose: false,
            scope: "local".to_string(),
        };
        match self.docker.inspect_network(name, Some(options)).await {
            Ok(network) => Ok(Some(NetworkDescriptor {
                id: network.id.unwrap_or_default(),
                name: network.name.unwrap_or_else(|| name.to_string()),
            })),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(map_engine_err(e)),
        }
    }

    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        aliases: &[String],
    ) -> EngineResult<()> {
        let options = ConnectNetworkOptions {
            container: container.to_string(),
            endpoint_config: EndpointSettings {
                aliases: (!aliases.is_empty()).then(|| aliases.to_vec()),
                ..Default::default()
            },
        };
        self.docker
            .connect_network(network, options)
            .await
            .map_err(map_engine_err)?;
        debug!(network = %network, container = %container, "container connected to network");
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> EngineResult<()> {
        self.docker.remove_network(name).await.map_err(map_engine_err)
    }
}

// Re-export the in-memory engine for tests
pub use mock::MockEngine;

mod mock {
    use super::*;
    use crate::domain::engine::NetworkRequest;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    /// In-memory [`ContainerEngine`] used by unit and integration tests.
    ///
    /// State fields are public so tests can assert on what happened.
    #[derive(Default)]
    pub struct MockEngine {
        pub images: Arc<Mutex<HashSet<String>>>,
        pub pulls: Arc<Mutex<Vec<String>>>,
        pub containers: Arc<Mutex<Vec<ContainerDescriptor>>>,
        pub networks: Arc<Mutex<HashMap<String, NetworkDescriptor>>>,
        pub network_creates: Arc<Mutex<usize>>,
        pub connections: Arc<Mutex<Vec<(String, String, Vec<String>)>>>,
        pub execs: Arc<Mutex<Vec<(String, Vec<String>)>>>,
        /// When set, `create_container` fails with a server error.
        pub refuse_creates: Arc<Mutex<bool>>,
        next_id: Arc<Mutex<u64>>,
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self::default()
        }

        fn fresh_id(&self) -> String {
            let mut next = self.next_id.lock();
            *next += 1;
            format!("mock-{next}")
        }
    }

    #[async_trait]
    impl ContainerEngine for MockEngine {
        async fn ping(&self) -> EngineResult<()> {
            Ok(())
        }

        async fn ensure_image(&self, image_ref: &str) -> EngineResult<()> {
            let mut images = self.images.lock();
            if images.insert(image_ref.to_string()) {
                self.pulls.lock().push(image_ref.to_string());
            }
            Ok(())
        }

        async fn create_container(&self, request: &ContainerRequest) -> EngineResult<String> {
            if *self.refuse_creates.lock() {
                return Err(EngineError::Api {
                    status: 500,
                    message: "create refused".to_string(),
                });
            }
            let id = self.fresh_id();
            self.containers.lock().push(ContainerDescriptor {
                id: id.clone(),
                name: request.name.clone(),
                state: "created".to_string(),
                labels: request
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                ip_address: None,
            });
            Ok(id)
        }

        async fn start_container(&self, id: &str) -> EngineResult<()> {
            let mut containers = self.containers.lock();
            match containers.iter_mut().find(|c| c.id == id || c.name == id) {
                Some(container) => {
                    container.state = "running".to_string();
                    Ok(())
                }
                None => Err(EngineError::NotFound(format!("no such container: {id}"))),
            }
        }

        async fn find_container(
            &self,
            labels: &[(String, String)],
        ) -> EngineResult<Option<ContainerDescriptor>> {
            let containers = self.containers.lock();
            Ok(containers
                .iter()
                .find(|c| {
                    labels
                        .iter()
                        .all(|(k, v)| c.labels.get(k).is_some_and(|found| found == v))
                })
                .cloned())
        }

        async fn inspect_container(
            &self,
            id_or_name: &str,
        ) -> EngineResult<Option<ContainerDescriptor>> {
            let containers = self.containers.lock();
            Ok(containers
                .iter()
                .find(|c| c.id == id_or_name || c.name == id_or_name)
                .cloned())
        }

        async fn remove_container(&self, id_or_name: &str) -> EngineResult<()> {
            let mut containers = self.containers.lock();
            let before = containers.len();
            containers.retain(|c| c.id != id_or_name && c.name != id_or_name);
            if containers.len() == before {
                return Err(EngineError::NotFound(format!(
                    "no such container: {id_or_name}"
                )));
            }
            Ok(())
        }

        async fn exec(
            &self,
            container: &str,
            cmd: &[String],
            _user: Option<&str>,
        ) -> EngineResult<String> {
            let known = self
                .containers
                .lock()
                .iter()
                .any(|c| c.id == container || c.name == container);
            if !known {
                return Err(EngineError::NotFound(format!(
                    "no such container: {container}"
                )));
            }
            self.execs
                .lock()
                .push((container.to_string(), cmd.to_vec()));
            Ok(String::new())
        }

        async fn create_network(&self, request: &NetworkRequest) -> EngineResult<String> {
            let mut networks = self.networks.lock();
            if networks.contains_key(&request.name) {
                return Err(EngineError::Conflict(format!(
                    "network {} already exists",
                    request.name
                )));
            }
            let id = self.fresh_id();
            networks.insert(
                request.name.clone(),
                NetworkDescriptor {
                    id: id.clone(),
                    name: request.name.clone(),
                },
            );
            *self.network_creates.lock() += 1;
            Ok(id)
        }

        async fn inspect_network(&self, name: &str) -> EngineResult<Option<NetworkDescriptor>> {
            Ok(self.networks.lock().get(name).cloned())
        }

        async fn connect_network(
            &self,
            network: &str,
            container: &str,
            aliases: &[String],
        ) -> EngineResult<()> {
            if !self.networks.lock().contains_key(network) {
                return Err(EngineError::NotFound(format!("no such network: {network}")));
            }
            self.connections.lock().push((
                network.to_string(),
                container.to_string(),
                aliases.to_vec(),
            ));
            Ok(())
        }

        async fn remove_network(&self, name: &str) -> EngineResult<()> {
            match self.networks.lock().remove(name) {
                Some(_) => Ok(()),
                None => Err(EngineError::NotFound(format!("no such network: {name}"))),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
