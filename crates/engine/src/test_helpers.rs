// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests: a temp directory with a main
//! configuration and a `mods/` tree, fake archive, fake module host, and a
//! runtime wired over them.

use crate::runtime::{Message, Runtime};
use sift_adapters::{dicom_file, FakeArchiveAdapter, FakeModuleHost};
use sift_core::{ChangeEvent, ChangeKind};
use tokio::sync::mpsc;

pub(crate) const MAIN_CONFIG: &str = r#"{
    // test configuration
    "ModuleLoadingHeuristic": "mods/*.code",
    "AutoRemove": true,
    "AutoReloadEach": 60
}"#;

pub(crate) struct TestBed {
    pub dir: tempfile::TempDir,
    pub archive: FakeArchiveAdapter,
    pub host: FakeModuleHost,
    pub runtime: Runtime<FakeArchiveAdapter, FakeModuleHost>,
    _tick_rx: mpsc::Receiver<Message>,
}

pub(crate) fn testbed() -> TestBed {
    testbed_with(Some(MAIN_CONFIG))
}

pub(crate) fn testbed_with(main_config: Option<&str>) -> TestBed {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("mods")).unwrap();
    let config_path = dir.path().join("siftd.json");
    if let Some(content) = main_config {
        std::fs::write(&config_path, content).unwrap();
    }
    let archive = FakeArchiveAdapter::new();
    let host = FakeModuleHost::new();
    let (tick_tx, tick_rx) = mpsc::channel(8);
    let runtime = Runtime::new(archive.clone(), host.clone(), config_path, tick_tx);
    TestBed { dir, archive, host, runtime, _tick_rx: tick_rx }
}

impl TestBed {
    pub fn write_module(&self, id: &str, config: &str) {
        let code = self.dir.path().join("mods").join(format!("{id}.code"));
        std::fs::write(&code, format!("body of {id}")).unwrap();
        std::fs::write(code.with_extension("json"), config).unwrap();
    }

    pub fn rewrite_module_code(&self, id: &str, body: &str) {
        let code = self.dir.path().join("mods").join(format!("{id}.code"));
        std::fs::write(&code, body).unwrap();
    }

    /// One external instance in the default P1/ST1/SE1 chain.
    pub fn seed_external(&self, instance: &str, called_aet: &str, tags: &[(&str, &str)]) {
        self.archive.add_series("P1", "ST1", "SE1", &[instance]);
        self.archive
            .set_metadata(instance, "DicomProtocol", Some(called_aet), Some("REMOTE"));
        self.archive.set_file(dicom_file(instance, tags));
    }
}

pub(crate) fn stable(kind: ChangeKind, resource_id: &str) -> ChangeEvent {
    ChangeEvent { kind, resource_id: resource_id.to_string() }
}

pub(crate) fn module_config(level: &str, calling_aet: &str) -> String {
    format!(
        r#"{{"TriggerLevel": "{level}", "ClassName": "Echo",
             "CallingAET": "{calling_aet}", "DestinationName": "dest1"}}"#
    )
}
