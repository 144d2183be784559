// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sift-core: domain types for the sift DICOM dispatcher.
//!
//! No I/O beyond reading configuration files; the archive and module
//! processes are reached through the adapter crate.

pub mod change;
pub mod config;
pub mod dicom;
pub mod filter;
pub mod hash;
pub mod tree;

pub use change::{ChangeEvent, ChangeKind, TriggerLevel};
pub use config::{ConfigError, FilterSpec, MainConfig, ModuleConfig, DEFAULT_ARCHIVE_URL};
pub use dicom::{DicomData, DicomFile, TagSource};
pub use filter::{matches, CompiledFilters, FILTER_TAGS};
pub use tree::Tree;
