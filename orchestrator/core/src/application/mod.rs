// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod fanout;
pub mod lifecycle;
pub mod manager;

// Re-export the services for convenience
pub use fanout::{run_pooled, DEFAULT_PARALLELISM};
pub use lifecycle::{ServiceLifecycle, StandardServiceLifecycle};
pub use manager::{ManagerError, ServiceManager, StandardServiceManager, TELEGRAF};
