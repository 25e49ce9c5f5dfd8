// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Composition synthesis and profile tests.
//!
//! Covers the file-level contract of the synthesizer:
//! - deterministic emission and sanitization
//! - an existing stack definition stays authoritative and is only sanitized
//! - profile membership: commuting add/remove of disjoint sets, no-op
//!   duplicates, teardown of emptied profiles
//! - profile recovery from run-state snapshots after a restart

use deckhand_core::domain::service::{ResolvedService, ServiceSpec};
use deckhand_core::infrastructure::compose::{ComposeError, ComposeSynthesizer};
use deckhand_core::infrastructure::state;
use deckhand_core::infrastructure::workspace::Workspace;
use std::collections::BTreeMap;
use std::sync::Arc;

fn service(name: &str, image: &str, version: &str, ports: &[u16]) -> ResolvedService {
    ResolvedService::new(ServiceSpec {
        name: name.to_string(),
        image: image.to_string(),
        version: version.to_string(),
        ports: ports.to_vec(),
        ..Default::default()
    })
}

fn workspace() -> (Arc<Workspace>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Arc::new(Workspace::at(dir.path().join("ws")).unwrap());
    (workspace, dir)
}

#[test]
fn test_materialization_is_byte_stable() {
    let (workspace, _dir) = workspace();
    let synthesizer = ComposeSynthesizer::new(workspace);
    let redis = service("redis", "redis", "7.2", &[6379]);

    let path = synthesizer.materialize_service(&redis).unwrap();
    let first = std::fs::read_to_string(&path).unwrap();
    synthesizer.materialize_service(&redis).unwrap();
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
    assert!(first.contains("redis:7.2"));
    assert!(first.contains("6379:6379"));
}

#[test]
fn test_existing_stack_definition_is_sanitized_not_replaced() {
    let (workspace, _dir) = workspace();
    let stack_file = workspace.stack_compose_file("shop");
    std::fs::create_dir_all(stack_file.parent().unwrap()).unwrap();
    let shipped = "\
version: '2.3'
services:
  web:
    build: ./web
    image: shop/web:5.1
    ports:
      - \"8000:8000\"
";
    std::fs::write(&stack_file, shipped).unwrap();

    let synthesizer = ComposeSynthesizer::new(workspace);
    let files = synthesizer.ensure_profile("shop", &[]).unwrap();

    assert_eq!(files, vec![stack_file.clone()]);
    let sanitized = std::fs::read_to_string(&stack_file).unwrap();
    assert!(sanitized.contains("3.9"), "legacy version must be rewritten");
    assert!(!sanitized.contains("build"), "build blocks must be stripped");
    assert!(
        sanitized.contains("shop/web:5.1"),
        "the user's services stay untouched"
    );
}

#[test]
fn test_missing_stack_definition_is_synthesized_from_members() {
    let (workspace, _dir) = workspace();
    let synthesizer = ComposeSynthesizer::new(workspace.clone());
    let base = vec![
        service("mysql", "mysql", "8.0", &[3306]),
        service("apache", "httpd", "2.4", &[80]),
    ];

    let files = synthesizer.ensure_profile("lamp", &base).unwrap();

    assert_eq!(files, vec![workspace.stack_compose_file("lamp")]);
    let emitted = std::fs::read_to_string(&files[0]).unwrap();
    assert!(emitted.contains("mysql:8.0"));
    assert!(emitted.contains("httpd:2.4"));
}

#[test]
fn test_add_and_remove_of_disjoint_sets_commute() {
    let (ws_a, _dir_a) = workspace();
    let (ws_b, _dir_b) = workspace();
    let synth_a = ComposeSynthesizer::new(ws_a);
    let synth_b = ComposeSynthesizer::new(ws_b);
    let redis = service("redis", "redis", "7.2", &[6379]);
    let kafka = service("kafka", "apache/kafka", "3.7.0", &[9092]);

    synth_a.ensure_profile("demo", &[]).unwrap();
    synth_a.add_member("demo", &redis).unwrap();
    let files_a = synth_a.add_member("demo", &kafka).unwrap();

    synth_b.ensure_profile("demo", &[]).unwrap();
    synth_b.add_member("demo", &kafka).unwrap();
    let files_b = synth_b.add_member("demo", &redis).unwrap();

    let mut set_a: Vec<String> = files_a
        .iter()
        .map(|p| p.parent().unwrap().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let mut set_b: Vec<String> = files_b
        .iter()
        .map(|p| p.parent().unwrap().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    set_a.sort();
    set_b.sort();
    assert_eq!(set_a, set_b, "order of disjoint adds must not matter");
    assert_eq!(files_a.len(), 3, "base definition plus two members");
}

#[test]
fn test_duplicate_add_and_absent_remove_are_noops() {
    let (workspace, _dir) = workspace();
    let synthesizer = ComposeSynthesizer::new(workspace);
    let redis = service("redis", "redis", "7.2", &[6379]);

    synthesizer.ensure_profile("demo", &[]).unwrap();
    synthesizer.add_member("demo", &redis).unwrap();
    let files = synthesizer.add_member("demo", &redis).unwrap();
    assert_eq!(files.len(), 2, "duplicate add keeps one member");

    let state = synthesizer.remove_member("demo", "kafka").unwrap();
    assert_eq!(state.files.len(), 2, "removing an absent member changes nothing");
    assert!(!state.empty);
}

#[test]
fn test_add_member_to_unknown_profile_is_an_error() {
    let (workspace, _dir) = workspace();
    let synthesizer = ComposeSynthesizer::new(workspace);
    let redis = service("redis", "redis", "7.2", &[6379]);

    let error = synthesizer.add_member("ghost", &redis).unwrap_err();
    assert!(matches!(error, ComposeError::UnknownProfile(name) if name == "ghost"));
}

#[test]
fn test_emptied_profile_is_destroyed_on_request() {
    let (workspace, _dir) = workspace();
    let synthesizer = ComposeSynthesizer::new(workspace.clone());
    let redis = service("redis", "redis", "7.2", &[6379]);

    synthesizer.ensure_profile("demo", &[]).unwrap();
    synthesizer.add_member("demo", &redis).unwrap();
    let state = synthesizer.remove_member("demo", "redis").unwrap();
    assert!(state.empty);

    synthesizer.destroy_profile("demo");
    assert!(!workspace.stack_dir("demo").exists());
    assert!(synthesizer.profile_members("demo").is_none());
}

#[test]
fn test_profile_recovers_from_run_state_after_restart() {
    let (workspace, _dir) = workspace();
    let env = BTreeMap::from([("TAG".to_string(), "dev".to_string())]);

    // first process: build the profile and snapshot the run
    {
        let synthesizer = ComposeSynthesizer::new(workspace.clone());
        synthesizer.ensure_profile("demo", &[]).unwrap();
        synthesizer
            .add_member("demo", &service("redis", "redis", "7.2", &[6379]))
            .unwrap();
        let files = synthesizer
            .add_member("demo", &service("kafka", "apache/kafka", "3.7.0", &[9092]))
            .unwrap();
        state::update(
            &state::run_id_for_stack("demo"),
            workspace.root(),
            &files,
            &env,
        );
    }

    // second process: a fresh synthesizer sees the same membership
    let restarted = ComposeSynthesizer::new(workspace.clone());
    assert_eq!(
        restarted.profile_members("demo"),
        Some(vec!["redis".to_string(), "kafka".to_string()])
    );
    let files = restarted.profile_files("demo").unwrap();
    assert_eq!(files[0], workspace.stack_compose_file("demo"));
    assert_eq!(files[1], workspace.service_compose_file("redis"));
    assert_eq!(files[2], workspace.service_compose_file("kafka"));
}
