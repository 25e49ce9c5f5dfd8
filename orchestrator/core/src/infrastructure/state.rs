// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run-state snapshots.
//!
//! Every composition run leaves a small YAML snapshot at
//! `<workdir>/<run-id>.run` recording what was driven and with which
//! environment, so a later invocation can tear the run down or inspect it
//! without the original command line.
//!
//! The store is strictly best-effort: writes and deletes log failures and
//! carry on, and recovery of a missing or corrupt snapshot degrades to an
//! empty record. Concurrent updates for the same run id are not serialized
//! here; callers own that ordering.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix of run ids produced by single-service composition runs.
pub const SERVICE_RUN_SUFFIX: &str = "-service";

/// Suffix of run ids produced by stack composition runs.
pub const STACK_RUN_SUFFIX: &str = "-stack";

/// Run id for a single-service composition run.
pub fn run_id_for_service(service: &str) -> String {
    format!("{service}{SERVICE_RUN_SUFFIX}")
}

/// Run id for a stack composition run.
pub fn run_id_for_stack(stack: &str) -> String {
    format!("{stack}{STACK_RUN_SUFFIX}")
}

// ============================================================================
// Record
// ============================================================================

/// Snapshot of one composition run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub id: String,

    /// Stack name for stack runs, derived from the first definition file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Service names in the order their definition files were driven.
    #[serde(default)]
    pub services: Vec<String>,

    /// Environment the composition tool ran with.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl RunRecord {
    /// An empty record carrying only the id; what recovery degrades to.
    pub fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Write the snapshot for a run.
///
/// For a `*-stack` id the first definition file names the stack (its parent
/// directory) and the rest name the member services; for any other id every
/// definition file names a service. Failures are logged and swallowed; a
/// lost snapshot must never fail the run it describes.
pub fn update(id: &str, workdir: &Path, compose_paths: &[PathBuf], env: &BTreeMap<String, String>) {
    let mut record = RunRecord {
        id: id.to_string(),
        env: env.clone(),
        ..Default::default()
    };

    if id.ends_with(STACK_RUN_SUFFIX) {
        record.stack = compose_paths.first().and_then(parent_dir_name);
        record.services = compose_paths
            .iter()
            .skip(1)
            .filter_map(parent_dir_name)
            .collect();
    } else {
        record.services = compose_paths.iter().filter_map(parent_dir_name).collect();
    }

    let path = run_file(id, workdir);
    let raw = match serde_yaml::to_string(&record) {
        Ok(raw) => raw,
        Err(error) => {
            counter!("deckhand_state_write_failures_total").increment(1);
            warn!(run = %id, error = %error, "run-state serialization failed, snapshot skipped");
            return;
        }
    };
    if let Err(error) = std::fs::write(&path, raw) {
        counter!("deckhand_state_write_failures_total").increment(1);
        warn!(run = %id, path = %path.display(), error = %error, "run-state write failed, snapshot skipped");
        return;
    }
    debug!(run = %id, path = %path.display(), "run-state snapshot written");
}

/// Read the snapshot for a run, degrading to [`RunRecord::empty`] on any
/// failure.
pub fn recover(id: &str, workdir: &Path) -> RunRecord {
    let path = run_file(id, workdir);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) => {
            counter!("deckhand_state_recover_degraded_total").increment(1);
            debug!(run = %id, path = %path.display(), error = %error, "no run-state snapshot, recovering empty");
            return RunRecord::empty(id);
        }
    };
    match serde_yaml::from_str(&raw) {
        Ok(record) => record,
        Err(error) => {
            counter!("deckhand_state_recover_degraded_total").increment(1);
            warn!(run = %id, path = %path.display(), error = %error, "run-state snapshot unreadable, recovering empty");
            RunRecord::empty(id)
        }
    }
}

/// Delete the snapshot for a run. Absence is fine; other failures are
/// logged and swallowed.
pub fn destroy(id: &str, workdir: &Path) {
    let path = run_file(id, workdir);
    match std::fs::remove_file(&path) {
        Ok(()) => debug!(run = %id, "run-state snapshot removed"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            warn!(run = %id, path = %path.display(), error = %error, "run-state removal failed");
        }
    }
}

fn run_file(id: &str, workdir: &Path) -> PathBuf {
    workdir.join(format!("{id}.run"))
}

fn parent_dir_name(path: &PathBuf) -> Option<String> {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_helpers() {
        assert_eq!(run_id_for_service("apache"), "apache-service");
        assert_eq!(run_id_for_stack("elastic"), "elastic-stack");
    }

    #[test]
    fn test_parent_dir_name() {
        let path = PathBuf::from("/ws/compose/services/apache/docker-compose.yml");
        assert_eq!(parent_dir_name(&path).as_deref(), Some("apache"));
    }
}
