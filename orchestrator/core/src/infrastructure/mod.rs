// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod compose;
pub mod engine;
pub mod network;
pub mod state;
pub mod workspace;

pub use compose::{
    ComposeCommand, ComposeError, ComposeRunner, ComposeSynthesizer, DockerComposeRunner,
};
pub use engine::{DockerEngine, MockEngine};
pub use network::{DevNetwork, DEV_NETWORK_NAME};
pub use state::RunRecord;
pub use workspace::{Workspace, WorkspaceError};
