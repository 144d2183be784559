// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! siftd: the sift DICOM dispatch daemon.
//!
//! Wires the Orthanc adapter, the out-of-process module host, and the
//! runtime actor together, then pumps the archive change feed until a
//! shutdown signal arrives.

mod watcher;

use sift_adapters::{OrthancAdapter, ProcessHost};
use sift_core::{MainConfig, DEFAULT_ARCHIVE_URL};
use sift_engine::{Message, Runtime};
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // The main configuration lives next to the executable, same stem.
    let config_path = match std::env::current_exe() {
        Ok(exe) => exe.with_extension("json"),
        Err(error) => {
            tracing::error!(%error, "cannot locate executable");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(path = %config_path.display(), "using main configuration");

    // The archive endpoint is pinned for the process lifetime; everything
    // else in the configuration hot-reloads inside the runtime.
    let (archive_url, username, password) = match MainConfig::load(&config_path) {
        Ok(config) => (config.archive_url, config.archive_username, config.archive_password),
        Err(error) => {
            tracing::warn!(%error, "error during loading config");
            (DEFAULT_ARCHIVE_URL.to_string(), None, None)
        }
    };
    let archive = OrthancAdapter::new(&archive_url, username, password);

    let (tx, rx) = mpsc::channel(64);
    let runtime = Runtime::new(archive.clone(), ProcessHost::new(), config_path, tx.clone());
    let runtime_task = tokio::spawn(runtime.run(rx));
    let watcher_task = tokio::spawn(watcher::watch_changes(archive, tx.clone()));

    if tx.send(Message::Started).await.is_err() {
        tracing::error!("runtime ended before startup");
        return ExitCode::FAILURE;
    }

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(%error, "cannot install signal handler");
            return ExitCode::FAILURE;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }

    tracing::info!("shutting down");
    watcher_task.abort();
    let _ = tx.send(Message::Stopped).await;
    let _ = runtime_task.await;
    ExitCode::SUCCESS
}
