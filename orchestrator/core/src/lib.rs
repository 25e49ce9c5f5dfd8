// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deckhand core
//!
//! Declarative provisioning of development services and stacks on top of a
//! local container engine.
//!
//! # Architecture
//!
//! - **domain:** the service catalog, merge rules and the engine gateway
//!   trait
//! - **application:** lifecycle, manager facade and the bounded fan-out
//!   pool
//! - **infrastructure:** the Docker gateway, dev network, composition
//!   files/tool, workspace layout and run-state snapshots

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
