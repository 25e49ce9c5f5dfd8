// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The shared dev network.
//!
//! Every service container joins one well-known bridge network so services
//! reach each other by alias while staying isolated from the outside. The
//! network is created lazily and never torn down implicitly.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::engine::{ContainerEngine, EngineError, EngineResult, NetworkDescriptor, NetworkRequest};
use crate::domain::service::{OWNER, OWNER_LABEL};

/// Name of the single dev network all managed containers join.
pub const DEV_NETWORK_NAME: &str = "deckhand-dev-network";

pub struct DevNetwork {
    engine: Arc<dyn ContainerEngine>,
}

impl DevNetwork {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Get or create the dev network. Idempotent: an existing network is
    /// returned as-is, and losing a creation race to a parallel caller is
    /// success.
    pub async fn ensure(&self) -> EngineResult<NetworkDescriptor> {
        if let Some(existing) = self.engine.inspect_network(DEV_NETWORK_NAME).await? {
            debug!(network = DEV_NETWORK_NAME, id = %existing.id, "dev network already present");
            return Ok(existing);
        }

        let request = NetworkRequest {
            name: DEV_NETWORK_NAME.to_string(),
            driver: "bridge".to_string(),
            internal: true,
            attachable: true,
            enable_ipv6: false,
            labels: BTreeMap::from([(OWNER_LABEL.to_string(), OWNER.to_string())]),
        };
        match self.engine.create_network(&request).await {
            Ok(id) => {
                info!(network = DEV_NETWORK_NAME, id = %id, "dev network created");
                Ok(NetworkDescriptor {
                    id,
                    name: DEV_NETWORK_NAME.to_string(),
                })
            }
            // Someone else created it between inspect and create.
            Err(EngineError::Conflict(_)) => match self
                .engine
                .inspect_network(DEV_NETWORK_NAME)
                .await?
            {
                Some(existing) => Ok(existing),
                None => Err(EngineError::NotFound(format!(
                    "network {DEV_NETWORK_NAME} reported as duplicate but not inspectable"
                ))),
            },
            Err(e) => Err(e),
        }
    }

    /// Attach a container under the given alias.
    pub async fn connect(&self, container: &str, alias: &str) -> EngineResult<()> {
        self.engine
            .connect_network(DEV_NETWORK_NAME, container, &[alias.to_string()])
            .await
    }

    /// Delete the dev network. An absent network is success.
    pub async fn remove(&self) -> EngineResult<()> {
        match self.engine.remove_network(DEV_NETWORK_NAME).await {
            Ok(()) => {
                info!(network = DEV_NETWORK_NAME, "dev network removed");
                Ok(())
            }
            Err(EngineError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::engine::MockEngine;

    #[tokio::test]
    async fn test_ensure_creates_once_and_is_idempotent() {
        let engine = Arc::new(MockEngine::new());
        let network = DevNetwork::new(engine.clone());

        let first = network.ensure().await.unwrap();
        let second = network.ensure().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(*engine.network_creates.lock(), 1);
        assert_eq!(first.name, DEV_NETWORK_NAME);
    }

    #[tokio::test]
    async fn test_connect_records_alias() {
        let engine = Arc::new(MockEngine::new());
        let network = DevNetwork::new(engine.clone());

        network.ensure().await.unwrap();
        network.connect("ctr-1", "elasticsearch").await.unwrap();

        let connections = engine.connections.lock();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].0, DEV_NETWORK_NAME);
        assert_eq!(connections[0].2, vec!["elasticsearch".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_absent_network_is_success() {
        let engine = Arc::new(MockEngine::new());
        let network = DevNetwork::new(engine);

        assert!(network.remove().await.is_ok());
    }
}
