// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Registry seeding and resolution tests.
//!
//! Covers the registry file lifecycle end to end:
//! - first load seeds the built-in defaults and the file becomes
//!   authoritative
//! - user edits survive reloads; only missing built-ins are backfilled
//! - empty stacks are rejected as configuration errors
//! - the classic build/run/destroy scenario over a clean registry

use deckhand_core::application::{
    ServiceLifecycle, ServiceManager, StandardServiceLifecycle, StandardServiceManager,
};
use deckhand_core::domain::catalog::{Catalog, CatalogError};
use deckhand_core::domain::engine::ContainerEngine;
use deckhand_core::infrastructure::compose::{ComposeRunner, ComposeSynthesizer, RecordingComposeRunner};
use deckhand_core::infrastructure::engine::MockEngine;
use deckhand_core::infrastructure::workspace::Workspace;
use std::sync::Arc;

fn registry_in(dir: &tempfile::TempDir) -> std::path::PathBuf {
    Workspace::at(dir.path().join("ws"))
        .expect("workspace")
        .registry_file()
}

#[test]
fn test_first_load_seeds_builtin_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = registry_in(&dir);

    let catalog = Catalog::load_or_seed(&path).expect("seed");

    assert!(path.is_file(), "registry file must exist after first load");
    let apache = catalog.service("apache").expect("apache is built in");
    assert_eq!(apache.image, "httpd");
    assert!(catalog.stack("elastic").is_some());
}

#[test]
fn test_user_edits_survive_and_missing_builtins_are_backfilled() {
    let dir = tempfile::tempdir().unwrap();
    let path = registry_in(&dir);

    // a user-authored registry knowing only about apache, with a custom
    // version and an extra service of their own
    let user_file = "\
services:
  apache:
    image: httpd
    version: \"2.5\"
  myapp:
    image: example/myapp
    version: \"1.0\"
    ports:
      - 8080
";
    std::fs::write(&path, user_file).unwrap();

    let catalog = Catalog::load_or_seed(&path).expect("reload");

    // the user's values win
    assert_eq!(catalog.service("apache").unwrap().version, "2.5");
    assert_eq!(catalog.service("myapp").unwrap().ports, vec![8080]);
    // built-ins the file does not mention appear
    assert!(catalog.service("mysql").is_some());
    assert!(catalog.stack("lamp").is_some());

    // and the backfill was written through
    let rewritten = std::fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("mysql"));
    assert!(rewritten.contains("2.5"));
}

#[test]
fn test_second_load_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = registry_in(&dir);

    Catalog::load_or_seed(&path).expect("seed");
    let first = std::fs::read_to_string(&path).unwrap();
    Catalog::load_or_seed(&path).expect("reload");
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second, "a fully seeded file is never rewritten");
}

#[test]
fn test_empty_stack_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = registry_in(&dir);

    let broken = "\
services:
  apache:
    image: httpd
    version: \"2.4\"
stacks:
  broken:
    label: Broken
    services: {}
";
    std::fs::write(&path, broken).unwrap();

    let error = Catalog::load_or_seed(&path).unwrap_err();
    assert!(matches!(error, CatalogError::EmptyStack(name) if name == "broken"));
}

#[tokio::test]
async fn test_apache_build_run_destroy_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Arc::new(Workspace::at(dir.path().join("ws")).unwrap());
    let catalog = Arc::new(Catalog::load_or_seed(&workspace.registry_file()).unwrap());

    let engine = Arc::new(MockEngine::new());
    let lifecycle = Arc::new(StandardServiceLifecycle::new(
        engine.clone() as Arc<dyn ContainerEngine>
    ));
    let manager = StandardServiceManager::new(
        catalog,
        lifecycle.clone(),
        Arc::new(ComposeSynthesizer::new(workspace.clone())),
        Arc::new(RecordingComposeRunner::new()) as Arc<dyn ComposeRunner>,
        workspace,
    );

    let service = manager.build("apache", Some("2.4"), false).expect("known service");
    assert_eq!(service.name(), "apache");
    assert_eq!(service.image_ref(), "httpd:2.4");
    assert!(!service.is_daemon());

    manager.run(&service).await.expect("run");
    assert!(lifecycle.inspect(&service).await.unwrap().is_some());

    manager.stop(&service).await.expect("destroy");
    assert!(
        lifecycle.inspect(&service).await.unwrap().is_none(),
        "no matching containers may remain"
    );
    manager.stop(&service).await.expect("second destroy still succeeds");
}
