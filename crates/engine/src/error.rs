// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error kinds.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the dispatch engine. None of them are fatal to the
/// daemon; callers log and keep serving.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] sift_core::ConfigError),
    #[error("module error: {0}")]
    Module(#[from] sift_adapters::HostError),
    #[error(transparent)]
    Archive(#[from] sift_adapters::ArchiveError),
    #[error("cannot hash `{path}`: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("module file missing: `{0}`")]
    MissingFile(PathBuf),
}
