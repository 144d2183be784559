// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sift_adapters::{FakeBehavior, FakeModuleHost};

fn write_module(dir: &Path, id: &str, calling_aet: &str) {
    let code_path = dir.join(format!("{id}.code"));
    std::fs::write(&code_path, format!("body of {id}")).unwrap();
    std::fs::write(
        code_path.with_extension("json"),
        format!(
            r#"{{"TriggerLevel": "Series", "ClassName": "Echo",
                 "CallingAET": "{calling_aet}", "DestinationName": "dest1"}}"#
        ),
    )
    .unwrap();
}

#[tokio::test]
async fn crawl_loads_discovered_modules_in_id_order() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "zeta", "AET_A");
    write_module(dir.path(), "alpha", "AET_A");

    let mut registry = ModuleRegistry::new(FakeModuleHost::new());
    registry.crawl(dir.path(), "*.code").await;

    let ids: Vec<&str> = registry.iter().map(Module::id).collect();
    assert_eq!(ids, vec!["alpha", "zeta"]);
}

#[tokio::test]
async fn crawl_twice_without_changes_reloads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    write_module(dir.path(), "echo", "AET_A");

    let mut registry = ModuleRegistry::new(host.clone());
    registry.crawl(dir.path(), "*.code").await;
    registry.crawl(dir.path(), "*.code").await;

    assert_eq!(registry.len(), 1);
    assert_eq!(host.loads().len(), 1);
}

#[tokio::test]
async fn crawl_reloads_changed_module() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    write_module(dir.path(), "echo", "AET_A");

    let mut registry = ModuleRegistry::new(host.clone());
    registry.crawl(dir.path(), "*.code").await;

    write_module(dir.path(), "echo", "AET_B");
    registry.crawl(dir.path(), "*.code").await;

    assert_eq!(host.loads().len(), 2);
    assert_eq!(
        registry.iter().next().unwrap().config().unwrap().calling_aet,
        "AET_B"
    );
}

#[tokio::test]
async fn failed_load_does_not_abort_the_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    host.behave("broken", FakeBehavior::FailLoad("boom".to_string()));
    write_module(dir.path(), "broken", "AET_A");
    write_module(dir.path(), "working", "AET_A");

    let mut registry = ModuleRegistry::new(host);
    registry.crawl(dir.path(), "*.code").await;

    let ids: Vec<&str> = registry.iter().map(Module::id).collect();
    assert_eq!(ids, vec!["working"]);
}

#[tokio::test]
async fn failed_reload_is_purged_after_the_pass() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    write_module(dir.path(), "echo", "AET_A");

    let mut registry = ModuleRegistry::new(host);
    registry.crawl(dir.path(), "*.code").await;
    assert_eq!(registry.len(), 1);

    // Break the configuration; the reload fails and the tombstone is gone
    // by the end of the crawl.
    std::fs::write(dir.path().join("echo.json"), "{\"TriggerLevel\": \"Bad\"}").unwrap();
    registry.crawl(dir.path(), "*.code").await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn module_gone_from_glob_stays_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    write_module(dir.path(), "echo", "AET_A");

    let mut registry = ModuleRegistry::new(host);
    registry.crawl(dir.path(), "*.code").await;

    std::fs::remove_file(dir.path().join("echo.code")).unwrap();
    registry.crawl(dir.path(), "*.code").await;

    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn bad_glob_is_logged_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ModuleRegistry::new(FakeModuleHost::new());
    registry.crawl(dir.path(), "***[").await;
    assert!(registry.is_empty());
}
