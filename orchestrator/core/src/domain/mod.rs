// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain layer: service and stack specifications, the engine gateway trait,
//! and the typed errors these carry.

pub mod catalog;
pub mod engine;
pub mod service;

pub use catalog::{Catalog, CatalogError, StackSpec};
pub use engine::{
    ContainerDescriptor, ContainerEngine, ContainerRequest, EngineError, EngineResult,
    NetworkDescriptor, NetworkRequest,
};
pub use service::{
    BuildMetadata, ResolvedService, ServiceSpec, WaitStrategy, CONTAINER_NAME_LABEL, OWNER,
    OWNER_LABEL,
};
