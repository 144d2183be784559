// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sift-adapters: I/O edges of the sift daemon.
//!
//! The archive adapter reaches the downstream DICOM archive over REST; the
//! module host runs processing modules as supervised child processes.

pub mod archive;
pub mod host;
pub mod orthanc;

pub use archive::{ArchiveAdapter, ArchiveError, InstanceMetadata, INTERNAL_ORIGIN};
pub use host::{
    HostError, HostReply, HostRequest, LoadSpec, ModuleHost, ModuleInstance, ProcessHost,
    ProcessParams, INIT_TIMEOUT,
};
pub use orthanc::{ChangeBatch, ChangeEntry, OrthancAdapter};

#[cfg(any(test, feature = "test-support"))]
pub use archive::{dicom_file, FakeArchiveAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use host::{FakeBehavior, FakeModuleHost};
