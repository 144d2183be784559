// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content hashing for hot-reload detection.

use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// Hex digest of a byte slice.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hex digest of a file's current on-disk content.
pub fn file_digest(path: &Path) -> io::Result<String> {
    Ok(digest(&std::fs::read(path)?))
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod tests;
