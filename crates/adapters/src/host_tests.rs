// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::archive::dicom_file;
use std::os::unix::fs::PermissionsExt;

#[test]
fn init_request_frames_as_tagged_json() {
    let mut config = serde_json::Map::new();
    config.insert("TriggerLevel".to_string(), Value::String("Series".to_string()));
    let request = HostRequest::Init { class_name: "Echo".to_string(), config };
    let line = serde_json::to_string(&request).unwrap();
    let parsed: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(parsed["method"], "init");
    assert_eq!(parsed["params"]["class_name"], "Echo");
    assert_eq!(parsed["params"]["config"]["TriggerLevel"], "Series");
}

#[test]
fn process_request_carries_level_and_shape() {
    let request = HostRequest::Process(ProcessParams {
        level: TriggerLevel::Study,
        remote_aet: "REMOTE".to_string(),
        studies: vec![vec![vec!["QUJD".to_string()], vec![]]],
    });
    let parsed: Value = serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
    assert_eq!(parsed["method"], "process");
    assert_eq!(parsed["params"]["level"], "Study");
    assert_eq!(parsed["params"]["studies"][0][0][0], "QUJD");
}

#[test]
fn replies_parse_ok_error_and_files() {
    let ok: HostReply = serde_json::from_str(r#"{"ok": true}"#).unwrap();
    assert!(ok.ok && ok.error.is_none());

    let error: HostReply = serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
    assert_eq!(error.error.as_deref(), Some("boom"));

    let files: HostReply = serde_json::from_str(r#"{"files": ["AA==", "AB"]}"#).unwrap();
    assert_eq!(files.files.len(), 2);
}

fn write_module(dir: &std::path::Path, name: &str, script: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn spec<'a>(path: &'a std::path::Path, config: &'a serde_json::Map<String, Value>) -> LoadSpec<'a> {
    LoadSpec { module_id: "echo", code_path: path, class_name: "Echo", config }
}

#[tokio::test]
async fn process_host_runs_a_module_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(
        dir.path(),
        "echo.sh",
        "#!/bin/sh\nread line\necho '{\"ok\": true}'\nread line\necho '{\"files\": [\"QUJD\"]}'\n",
    );
    let config = serde_json::Map::new();

    let mut instance = ProcessHost::new().load(spec(&path, &config)).await.unwrap();
    let files = Tree::from_studies(vec![vec![vec![Arc::new(dicom_file("i1", &[]))]]]);
    let produced = instance
        .process(TriggerLevel::Series, &files, "REMOTE")
        .await
        .unwrap();
    assert_eq!(produced, vec![b"ABC".to_vec()]);
}

#[tokio::test]
async fn process_host_surfaces_init_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(
        dir.path(),
        "bad.sh",
        "#!/bin/sh\nread line\necho '{\"error\": \"no such class\"}'\n",
    );
    let config = serde_json::Map::new();

    let error = ProcessHost::new().load(spec(&path, &config)).await.unwrap_err();
    assert!(matches!(error, HostError::Module(_)), "{error}");
}

#[tokio::test]
async fn process_host_times_out_a_silent_init() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_module(dir.path(), "slow.sh", "#!/bin/sh\nsleep 5\n");
    let config = serde_json::Map::new();

    let host = ProcessHost::with_init_timeout(Duration::from_millis(100));
    let error = host.load(spec(&path, &config)).await.unwrap_err();
    assert!(matches!(error, HostError::InitTimeout { .. }), "{error}");
}

#[tokio::test]
async fn process_host_reports_spawn_failure() {
    let config = serde_json::Map::new();
    let path = std::path::Path::new("/nonexistent/module.sh");
    let error = ProcessHost::new().load(spec(path, &config)).await.unwrap_err();
    assert!(matches!(error, HostError::Spawn { .. }), "{error}");
}

#[tokio::test]
async fn fake_host_echoes_and_records() {
    let host = FakeModuleHost::new();
    let config = serde_json::Map::new();
    let path = std::path::Path::new("mods/echo.sh");
    let mut instance = host.load(spec(path, &config)).await.unwrap();

    let files = Tree::from_studies(vec![vec![
        vec![Arc::new(dicom_file("i1", &[])), Arc::new(dicom_file("i2", &[]))],
        vec![],
    ]]);
    let produced = instance
        .process(TriggerLevel::Patient, &files, "REMOTE")
        .await
        .unwrap();
    assert_eq!(produced.len(), 2);

    let calls = host.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].file_ids, vec!["i1", "i2"]);
    assert_eq!(calls[0].shape, vec![vec![2, 0]]);
    assert_eq!(host.loads().len(), 1);
}
