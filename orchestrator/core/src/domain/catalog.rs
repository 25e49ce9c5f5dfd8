// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The service registry: built-in defaults, the user-editable registry file,
//! and stack definitions.
//!
//! The catalog is an explicit value created once at startup and shared by
//! reference; there is no process-global. The registry file under the
//! workspace is authoritative once seeded: user edits are never overwritten,
//! and only services missing from the file are backfilled from the shipped
//! defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::service::ServiceSpec;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read registry file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write registry file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry file {path} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("registry serialization failed: {0}")]
    Serialize(serde_yaml::Error),

    #[error("stack '{0}' declares no services")]
    EmptyStack(String),
}

// ============================================================================
// Stack Specification
// ============================================================================

/// A named group of services driven as one unit.
///
/// Each member entry is an override spec merged over the service's catalog
/// defaults; an empty override means "pure defaults".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackSpec {
    /// Human-readable description shown in listings.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,

    /// Member service name -> override spec.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceSpec>,
}

// ============================================================================
// Catalog
// ============================================================================

/// The full service registry: services and stacks.
///
/// Unknown keys in the registry file are ignored on load, so older builds
/// keep reading files written by newer ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    services: BTreeMap<String, ServiceSpec>,

    #[serde(default)]
    stacks: BTreeMap<String, StackSpec>,
}

impl Catalog {
    /// The defaults embedded in the binary.
    pub fn builtin() -> Self {
        Self {
            services: builtin_services(),
            stacks: builtin_stacks(),
        }
    }

    /// Load the registry from `path`, seeding it with the built-in defaults
    /// on first run.
    ///
    /// An existing file is authoritative; services present in the shipped
    /// defaults but missing from the file are backfilled and the file is
    /// rewritten once.
    pub fn load_or_seed(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            let catalog = Self::builtin();
            catalog.to_yaml_file(path)?;
            info!(path = %path.display(), "seeded registry with built-in defaults");
            return Ok(catalog);
        }

        let mut catalog = Self::from_yaml_file(path)?;
        let added = catalog.backfill();
        if added > 0 {
            catalog.to_yaml_file(path)?;
            info!(
                path = %path.display(),
                added,
                "backfilled new built-in services into registry"
            );
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a registry file. Fails fatally on unreadable or invalid input;
    /// a broken registry is a configuration error, not something to guess
    /// around.
    pub fn from_yaml_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut catalog: Catalog =
            serde_yaml::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        catalog.normalize();
        Ok(catalog)
    }

    /// Write the registry to `path`, creating parent directories as needed.
    pub fn to_yaml_file(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let raw = serde_yaml::to_string(self).map_err(CatalogError::Serialize)?;
        std::fs::write(path, raw).map_err(|source| CatalogError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up a service spec by name.
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    /// Look up a stack spec by name.
    pub fn stack(&self, name: &str) -> Option<&StackSpec> {
        self.stacks.get(name)
    }

    pub fn services(&self) -> &BTreeMap<String, ServiceSpec> {
        &self.services
    }

    pub fn stacks(&self) -> &BTreeMap<String, StackSpec> {
        &self.stacks
    }

    /// Sorted names of every registered service.
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    /// Sorted names of every registered stack.
    pub fn stack_names(&self) -> Vec<String> {
        self.stacks.keys().cloned().collect()
    }

    /// Add built-in services and stacks that the file does not know yet.
    /// Entries the user already has, modified or not, are left untouched.
    /// Returns how many entries were added.
    pub fn backfill(&mut self) -> usize {
        let mut added = 0;
        for (name, spec) in builtin_services() {
            if !self.services.contains_key(&name) {
                self.services.insert(name, spec);
                added += 1;
            }
        }
        for (name, stack) in builtin_stacks() {
            if !self.stacks.contains_key(&name) {
                self.stacks.insert(name, stack);
                added += 1;
            }
        }
        added
    }

    /// Reject configurations that cannot possibly run. Stack members that
    /// are not registry services are only warned about; composite services
    /// are constructed procedurally and never appear in the registry.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (name, stack) in &self.stacks {
            if stack.services.is_empty() {
                return Err(CatalogError::EmptyStack(name.clone()));
            }
            for member in stack.services.keys() {
                if !self.services.contains_key(member) {
                    warn!(stack = %name, service = %member, "stack references a service not in the registry");
                }
            }
        }
        Ok(())
    }

    /// Service names come from the map keys, never from the file body.
    fn normalize(&mut self) {
        for (name, spec) in &mut self.services {
            spec.name = name.clone();
        }
        for stack in self.stacks.values_mut() {
            for (name, spec) in &mut stack.services {
                spec.name = name.clone();
            }
        }
    }
}

// ============================================================================
// Built-in Defaults
// ============================================================================

fn env_of(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn service(name: &str, image: &str, version: &str, ports: &[u16]) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        image: image.to_string(),
        version: version.to_string(),
        ports: ports.to_vec(),
        ..Default::default()
    }
}

fn builtin_services() -> BTreeMap<String, ServiceSpec> {
    let mut services = BTreeMap::new();

    services.insert("apache".to_string(), service("apache", "httpd", "2.4", &[80]));

    let mut elasticsearch = service(
        "elasticsearch",
        "elasticsearch",
        "8.14.3",
        &[9200],
    );
    elasticsearch.env = env_of(&[
        ("ES_JAVA_OPTS", "-Xms512m -Xmx512m"),
        ("bootstrap.memory_lock", "true"),
        ("discovery.type", "single-node"),
        ("xpack.security.enabled", "false"),
    ]);
    services.insert("elasticsearch".to_string(), elasticsearch);

    services.insert(
        "kafka".to_string(),
        service("kafka", "apache/kafka", "3.7.0", &[9092]),
    );
    services.insert(
        "kibana".to_string(),
        service("kibana", "kibana", "8.14.3", &[5601]),
    );
    services.insert(
        "mongodb".to_string(),
        service("mongodb", "mongo", "7.0", &[27017]),
    );

    let mut mysql = service("mysql", "mysql", "8.0", &[3306]);
    mysql.env = env_of(&[("MYSQL_ROOT_PASSWORD", "secret")]);
    services.insert("mysql".to_string(), mysql);

    services.insert(
        "redis".to_string(),
        service("redis", "redis", "7.2", &[6379]),
    );

    services
}

fn builtin_stacks() -> BTreeMap<String, StackSpec> {
    let mut stacks = BTreeMap::new();

    let mut elastic_members = BTreeMap::new();
    elastic_members.insert(
        "elasticsearch".to_string(),
        ServiceSpec {
            name: "elasticsearch".to_string(),
            daemon: true,
            ..Default::default()
        },
    );
    elastic_members.insert(
        "kibana".to_string(),
        ServiceSpec {
            name: "kibana".to_string(),
            daemon: true,
            // Reaches elasticsearch by its alias on the shared dev network.
            env: env_of(&[("ELASTICSEARCH_HOSTS", "http://elasticsearch:9200")]),
            ..Default::default()
        },
    );
    stacks.insert(
        "elastic".to_string(),
        StackSpec {
            label: "Elasticsearch + Kibana".to_string(),
            services: elastic_members,
        },
    );

    let mut lamp_members = BTreeMap::new();
    lamp_members.insert(
        "mysql".to_string(),
        ServiceSpec {
            name: "mysql".to_string(),
            daemon: true,
            ..Default::default()
        },
    );
    lamp_members.insert(
        "apache".to_string(),
        ServiceSpec {
            name: "apache".to_string(),
            daemon: true,
            ..Default::default()
        },
    );
    stacks.insert(
        "lamp".to_string(),
        StackSpec {
            label: "MySQL + Apache".to_string(),
            services: lamp_members,
        },
    );

    stacks
}

// ============================================================================
// Tests
// ============================================================================
