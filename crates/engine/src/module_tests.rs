// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sift_adapters::{FakeBehavior, FakeModuleHost};
use std::path::Path;

const ECHO_CONFIG: &str = r#"{
    "TriggerLevel": "Series",
    "ClassName": "Echo",
    "CallingAET": "AET_A",
    "DestinationName": "dest1"
}"#;

fn write_module_files(dir: &Path, id: &str, config: &str) -> PathBuf {
    let code_path = dir.join(format!("{id}.code"));
    std::fs::write(&code_path, format!("module body for {id}")).unwrap();
    std::fs::write(code_path.with_extension("json"), config).unwrap();
    code_path
}

#[tokio::test]
async fn load_records_hashes_and_instance() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    let code_path = write_module_files(dir.path(), "echo", ECHO_CONFIG);

    let module = Module::load(host.clone(), "echo".to_string(), code_path).await.unwrap();
    assert!(module.is_loaded());
    assert!(module.code_hash.is_some());
    assert!(module.config_hash.is_some());
    assert_eq!(module.config().unwrap().calling_aet, "AET_A");

    let loads = host.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].class_name, "Echo");
}

#[tokio::test]
async fn load_requires_companion_config() {
    let dir = tempfile::tempdir().unwrap();
    let code_path = dir.path().join("lonely.code");
    std::fs::write(&code_path, "body").unwrap();

    let error = Module::load(FakeModuleHost::new(), "lonely".to_string(), code_path)
        .await
        .unwrap_err();
    assert!(matches!(error, EngineError::MissingFile(_)), "{error}");
}

#[tokio::test]
async fn load_rejects_bad_trigger_level() {
    let dir = tempfile::tempdir().unwrap();
    let code_path = write_module_files(
        dir.path(),
        "bad",
        r#"{"TriggerLevel": "Instance", "ClassName": "X", "CallingAET": "A", "DestinationName": "d"}"#,
    );
    let error = Module::load(FakeModuleHost::new(), "bad".to_string(), code_path)
        .await
        .unwrap_err();
    assert!(matches!(error, EngineError::Config(_)), "{error}");
}

#[tokio::test]
async fn load_surfaces_host_failure() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    host.behave("echo", FakeBehavior::FailLoad("no such class".to_string()));
    let code_path = write_module_files(dir.path(), "echo", ECHO_CONFIG);

    let error = Module::load(host, "echo".to_string(), code_path).await.unwrap_err();
    assert!(matches!(error, EngineError::Module(_)), "{error}");
}

#[tokio::test]
async fn unchanged_files_cause_no_reload() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    let code_path = write_module_files(dir.path(), "echo", ECHO_CONFIG);

    let mut module = Module::load(host.clone(), "echo".to_string(), code_path).await.unwrap();
    module.check_update().await.unwrap();
    module.check_update().await.unwrap();
    assert_eq!(host.loads().len(), 1);
}

#[tokio::test]
async fn config_change_reloads_config_and_code() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    let code_path = write_module_files(dir.path(), "echo", ECHO_CONFIG);
    let mut module = Module::load(host.clone(), "echo".to_string(), code_path.clone())
        .await
        .unwrap();

    std::fs::write(
        code_path.with_extension("json"),
        ECHO_CONFIG.replace("AET_A", "AET_B"),
    )
    .unwrap();
    module.check_update().await.unwrap();

    assert!(module.is_loaded());
    assert_eq!(module.config().unwrap().calling_aet, "AET_B");
    let loads = host.loads();
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[1].config["CallingAET"], "AET_B");
}

#[tokio::test]
async fn code_change_reloads_code_only() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    let code_path = write_module_files(dir.path(), "echo", ECHO_CONFIG);
    let mut module = Module::load(host.clone(), "echo".to_string(), code_path.clone())
        .await
        .unwrap();
    let config_hash_before = module.config_hash.clone();

    std::fs::write(&code_path, "new module body").unwrap();
    module.check_update().await.unwrap();

    assert!(module.is_loaded());
    // Configuration untouched: same recorded hash, same parsed AET.
    assert_eq!(module.config_hash, config_hash_before);
    assert_eq!(module.config().unwrap().calling_aet, "AET_A");
    assert_eq!(host.loads().len(), 2);
}

#[tokio::test]
async fn failed_reload_tombstones_the_module() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    let code_path = write_module_files(dir.path(), "echo", ECHO_CONFIG);
    let mut module = Module::load(host.clone(), "echo".to_string(), code_path.clone())
        .await
        .unwrap();

    std::fs::write(
        code_path.with_extension("json"),
        r#"{"TriggerLevel": "Nowhere"}"#,
    )
    .unwrap();
    assert!(module.check_update().await.is_err());
    assert!(!module.is_loaded());

    // A tombstoned module produces nothing.
    let files = sift_core::Tree::new();
    let produced = module
        .process(TriggerLevel::Series, &files, "REMOTE")
        .await
        .unwrap();
    assert!(produced.is_empty());
}

#[tokio::test]
async fn unreadable_hash_leaves_module_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeModuleHost::new();
    let code_path = write_module_files(dir.path(), "echo", ECHO_CONFIG);
    let mut module = Module::load(host.clone(), "echo".to_string(), code_path.clone())
        .await
        .unwrap();

    std::fs::remove_file(code_path.with_extension("json")).unwrap();
    assert!(module.check_update().await.is_err());
    // Not a reload failure: the previous instance stays live.
    assert!(module.is_loaded());
}
