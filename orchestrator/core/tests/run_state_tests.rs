// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run-state snapshot tests.
//!
//! Exercises the `<workdir>/<run-id>.run` snapshots:
//! - update/recover round-trips the environment and targets
//! - the `-stack` id suffix drives stack/service derivation from the
//!   definition file paths
//! - recovery degrades to an empty record instead of failing
//! - destroy is best-effort and tolerates absence

use deckhand_core::infrastructure::state;
use std::collections::BTreeMap;
use std::path::PathBuf;

fn service_paths(root: &std::path::Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| root.join(name).join("docker-compose.yml"))
        .collect()
}

#[test]
fn test_update_recover_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let env = BTreeMap::from([
        ("STACK_VERSION".to_string(), "8.14.3".to_string()),
        ("TAG".to_string(), "dev".to_string()),
    ]);
    let paths = service_paths(dir.path(), &["redis"]);

    let id = state::run_id_for_service("redis");
    state::update(&id, dir.path(), &paths, &env);
    let record = state::recover(&id, dir.path());

    assert_eq!(record.id, id);
    assert_eq!(record.env, env);
    assert!(record.stack.is_none());
    assert_eq!(record.services, vec!["redis".to_string()]);
    assert!(dir.path().join("redis-service.run").is_file());
}

#[test]
fn test_stack_id_derives_parent_and_children() {
    let dir = tempfile::tempdir().unwrap();
    let paths = service_paths(dir.path(), &["foo", "api", "worker"]);

    state::update("foo-stack", dir.path(), &paths, &BTreeMap::new());
    let record = state::recover("foo-stack", dir.path());

    assert_eq!(record.stack.as_deref(), Some("foo"));
    assert_eq!(
        record.services,
        vec!["api".to_string(), "worker".to_string()]
    );
}

#[test]
fn test_recover_missing_snapshot_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();

    let record = state::recover("ghost-service", dir.path());

    assert_eq!(record.id, "ghost-service");
    assert!(record.env.is_empty());
    assert!(record.services.is_empty());
}

#[test]
fn test_recover_corrupt_snapshot_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad-service.run"), "{ unterminated").unwrap();

    let record = state::recover("bad-service", dir.path());

    assert_eq!(record.id, "bad-service");
    assert!(record.env.is_empty());
}

#[test]
fn test_destroy_removes_the_snapshot_and_tolerates_absence() {
    let dir = tempfile::tempdir().unwrap();
    let paths = service_paths(dir.path(), &["redis"]);
    state::update("redis-service", dir.path(), &paths, &BTreeMap::new());

    state::destroy("redis-service", dir.path());
    assert!(!dir.path().join("redis-service.run").exists());

    // second destroy has nothing to do and must not panic
    state::destroy("redis-service", dir.path());
}

#[test]
fn test_updates_for_different_runs_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let redis_env = BTreeMap::from([("A".to_string(), "1".to_string())]);
    let kafka_env = BTreeMap::from([("B".to_string(), "2".to_string())]);

    state::update(
        "redis-service",
        dir.path(),
        &service_paths(dir.path(), &["redis"]),
        &redis_env,
    );
    state::update(
        "kafka-service",
        dir.path(),
        &service_paths(dir.path(), &["kafka"]),
        &kafka_env,
    );

    assert_eq!(state::recover("redis-service", dir.path()).env, redis_env);
    assert_eq!(state::recover("kafka-service", dir.path()).env, kafka_env);
}
