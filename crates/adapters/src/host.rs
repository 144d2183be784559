// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Out-of-process module hosting.
//!
//! A module is a standalone executable. The host spawns it and speaks a
//! line-framed JSON protocol over its stdin/stdout: an `init` exchange
//! carrying the class name and the module configuration, then one
//! `process` exchange per dispatch, DICOM payloads base64-encoded. A
//! crashed or misbehaving module only ever fails its own requests.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sift_core::{DicomFile, Tree, TriggerLevel};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// How long a freshly spawned module may take to acknowledge `init`.
pub const INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from module hosting.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot spawn module `{path}`: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("module pipe error: {0}")]
    Io(#[from] std::io::Error),
    #[error("module `{module}` did not acknowledge init within {timeout:?}")]
    InitTimeout { module: String, timeout: Duration },
    #[error("module `{module}` exited")]
    Exited { module: String },
    #[error("module error: {0}")]
    Module(String),
    #[error("module protocol error: {0}")]
    Protocol(String),
}

/// Requests sent over the module pipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum HostRequest {
    Init {
        class_name: String,
        config: serde_json::Map<String, Value>,
    },
    Process(ProcessParams),
}

/// The `process` payload: the uniform three-level batch plus its level tag
/// and the sender's identity. Leaves are base64 DICOM files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessParams {
    pub level: TriggerLevel,
    pub remote_aet: String,
    pub studies: Vec<Vec<Vec<String>>>,
}

/// Replies read from the module pipe.
#[derive(Debug, Default, Deserialize)]
pub struct HostReply {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What a descriptor hands the host at load time.
pub struct LoadSpec<'a> {
    pub module_id: &'a str,
    pub code_path: &'a Path,
    pub class_name: &'a str,
    pub config: &'a serde_json::Map<String, Value>,
}

/// Spawns and owns module instances.
#[async_trait]
pub trait ModuleHost: Clone + Send + Sync + 'static {
    type Instance: ModuleInstance;

    /// Start the module and run the init exchange. Any failure here is a
    /// load failure; the descriptor tombstones.
    async fn load(&self, spec: LoadSpec<'_>) -> Result<Self::Instance, HostError>;
}

/// A running module.
#[async_trait]
pub trait ModuleInstance: Send + Sync {
    /// Hand the batch to the module and collect the DICOM files it
    /// produced. No timeout: a module owns its callback for as long as it
    /// computes.
    async fn process(
        &mut self,
        level: TriggerLevel,
        files: &Tree<Arc<DicomFile>>,
        remote_aet: &str,
    ) -> Result<Vec<Vec<u8>>, HostError>;
}

/// Production host: one child process per module, killed on drop.
#[derive(Clone, Debug)]
pub struct ProcessHost {
    init_timeout: Duration,
}

impl Default for ProcessHost {
    fn default() -> Self {
        Self { init_timeout: INIT_TIMEOUT }
    }
}

impl ProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_init_timeout(init_timeout: Duration) -> Self {
        Self { init_timeout }
    }
}

/// A module child process with its pipe endpoints.
#[derive(Debug)]
pub struct ProcessInstance {
    module_id: String,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    // Held so kill-on-drop reaps the child with the instance.
    _child: Child,
}

impl ProcessInstance {
    async fn exchange(&mut self, request: &HostRequest) -> Result<HostReply, HostError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| HostError::Protocol(e.to_string()))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let mut reply = String::new();
        let read = self.stdout.read_line(&mut reply).await?;
        if read == 0 {
            return Err(HostError::Exited { module: self.module_id.clone() });
        }
        serde_json::from_str(&reply).map_err(|e| HostError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl ModuleHost for ProcessHost {
    type Instance = ProcessInstance;

    async fn load(&self, spec: LoadSpec<'_>) -> Result<ProcessInstance, HostError> {
        tracing::debug!(module = %spec.module_id, path = %spec.code_path.display(), "spawning module process");
        let mut child = Command::new(spec.code_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Module stderr shares the daemon's; modules log like we do.
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HostError::Spawn {
                path: spec.code_path.display().to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HostError::Protocol("module stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HostError::Protocol("module stdout unavailable".to_string()))?;

        let mut instance = ProcessInstance {
            module_id: spec.module_id.to_string(),
            stdin,
            stdout: BufReader::new(stdout),
            _child: child,
        };

        let init = HostRequest::Init {
            class_name: spec.class_name.to_string(),
            config: spec.config.clone(),
        };
        let reply = tokio::time::timeout(self.init_timeout, instance.exchange(&init))
            .await
            .map_err(|_| HostError::InitTimeout {
                module: spec.module_id.to_string(),
                timeout: self.init_timeout,
            })??;
        if let Some(error) = reply.error {
            return Err(HostError::Module(error));
        }
        if !reply.ok {
            return Err(HostError::Protocol("init not acknowledged".to_string()));
        }
        Ok(instance)
    }
}

#[async_trait]
impl ModuleInstance for ProcessInstance {
    async fn process(
        &mut self,
        level: TriggerLevel,
        files: &Tree<Arc<DicomFile>>,
        remote_aet: &str,
    ) -> Result<Vec<Vec<u8>>, HostError> {
        let studies = files
            .studies()
            .iter()
            .map(|study| {
                study
                    .iter()
                    .map(|series| series.iter().map(|f| BASE64.encode(&f.bytes)).collect())
                    .collect()
            })
            .collect();
        let request = HostRequest::Process(ProcessParams {
            level,
            remote_aet: remote_aet.to_string(),
            studies,
        });

        let reply = self.exchange(&request).await?;
        if let Some(error) = reply.error {
            return Err(HostError::Module(error));
        }
        reply
            .files
            .iter()
            .map(|encoded| {
                BASE64
                    .decode(encoded)
                    .map_err(|e| HostError::Protocol(format!("bad file payload: {e}")))
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{HostError, LoadSpec, ModuleHost, ModuleInstance};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use sift_core::{DicomFile, Tree, TriggerLevel};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted behaviour of a fake module, keyed by module id.
    #[derive(Debug, Clone)]
    pub enum FakeBehavior {
        /// Return the input files unchanged.
        Echo,
        /// Return this many synthesized files.
        Produce(usize),
        /// Fail the init exchange.
        FailLoad(String),
        /// Fail every process call.
        FailProcess(String),
    }

    /// One recorded load.
    #[derive(Debug, Clone)]
    pub struct FakeLoad {
        pub module_id: String,
        pub class_name: String,
        pub config: serde_json::Map<String, Value>,
    }

    /// One recorded process call.
    #[derive(Debug, Clone)]
    pub struct FakeProcessCall {
        pub module_id: String,
        pub level: TriggerLevel,
        pub remote_aet: String,
        /// Leaf ids in batch order.
        pub file_ids: Vec<String>,
        /// Series sizes per study, the delivered shape.
        pub shape: Vec<Vec<usize>>,
    }

    #[derive(Default)]
    struct FakeHostState {
        behaviors: HashMap<String, FakeBehavior>,
        loads: Vec<FakeLoad>,
        calls: Vec<FakeProcessCall>,
    }

    /// Fake module host recording loads and process calls.
    #[derive(Clone, Default)]
    pub struct FakeModuleHost {
        inner: Arc<Mutex<FakeHostState>>,
    }

    impl FakeModuleHost {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the behaviour of a module id; unscripted modules echo.
        pub fn behave(&self, module_id: &str, behavior: FakeBehavior) {
            self.inner.lock().behaviors.insert(module_id.to_string(), behavior);
        }

        pub fn loads(&self) -> Vec<FakeLoad> {
            self.inner.lock().loads.clone()
        }

        pub fn calls(&self) -> Vec<FakeProcessCall> {
            self.inner.lock().calls.clone()
        }
    }

    /// Instance handle produced by [`FakeModuleHost`].
    pub struct FakeModuleInstance {
        module_id: String,
        behavior: FakeBehavior,
        inner: Arc<Mutex<FakeHostState>>,
    }

    #[async_trait]
    impl ModuleHost for FakeModuleHost {
        type Instance = FakeModuleInstance;

        async fn load(&self, spec: LoadSpec<'_>) -> Result<FakeModuleInstance, HostError> {
            let behavior = {
                let state = self.inner.lock();
                state
                    .behaviors
                    .get(spec.module_id)
                    .cloned()
                    .unwrap_or(FakeBehavior::Echo)
            };
            if let FakeBehavior::FailLoad(message) = &behavior {
                return Err(HostError::Module(message.clone()));
            }
            self.inner.lock().loads.push(FakeLoad {
                module_id: spec.module_id.to_string(),
                class_name: spec.class_name.to_string(),
                config: spec.config.clone(),
            });
            Ok(FakeModuleInstance {
                module_id: spec.module_id.to_string(),
                behavior,
                inner: self.inner.clone(),
            })
        }
    }

    #[async_trait]
    impl ModuleInstance for FakeModuleInstance {
        async fn process(
            &mut self,
            level: TriggerLevel,
            files: &Tree<Arc<DicomFile>>,
            remote_aet: &str,
        ) -> Result<Vec<Vec<u8>>, HostError> {
            self.inner.lock().calls.push(FakeProcessCall {
                module_id: self.module_id.clone(),
                level,
                remote_aet: remote_aet.to_string(),
                file_ids: files.iter().map(|f| f.id.clone()).collect(),
                shape: files
                    .studies()
                    .iter()
                    .map(|study| study.iter().map(Vec::len).collect())
                    .collect(),
            });
            match &self.behavior {
                FakeBehavior::Echo => Ok(files.iter().map(|f| f.bytes.clone()).collect()),
                FakeBehavior::Produce(count) => Ok((0..*count)
                    .map(|i| format!("PRODUCED-{}-{}", self.module_id, i).into_bytes())
                    .collect()),
                FakeBehavior::FailProcess(message) => Err(HostError::Module(message.clone())),
                // Load would have failed already; behave as an empty module.
                FakeBehavior::FailLoad(_) => Ok(Vec::new()),
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBehavior, FakeLoad, FakeModuleHost, FakeModuleInstance, FakeProcessCall};

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
