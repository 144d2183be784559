// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-object filter evaluation.
//!
//! Filter maps associate an allow-listed tag name with a list of regular
//! expressions (Rust `regex` dialect, unanchored search). An object passes
//! when every positive entry finds its tag present with at least one
//! pattern matching, and no negative pattern matches a present tag.

use crate::dicom::TagSource;
use regex::Regex;
use std::collections::HashMap;

/// Tags a filter map may constrain. Keys outside this list are silently
/// ignored.
pub const FILTER_TAGS: [&str; 15] = [
    "AccessionNumber",
    "PatientName",
    "PatientID",
    "StudyDescription",
    "SeriesDescription",
    "ImageType",
    "InstitutionName",
    "InstitutionalDepartmentName",
    "Manufacturer",
    "ManufacturerModelName",
    "Modality",
    "OperatorsName",
    "PerformingPhysicianName",
    "ProtocolName",
    "StudyID",
];

/// A filter map with its patterns compiled, allow-list applied.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    entries: Vec<FilterEntry>,
}

#[derive(Debug, Clone)]
struct FilterEntry {
    tag: &'static str,
    patterns: Vec<Regex>,
}

impl CompiledFilters {
    /// Compile the allow-listed entries of a raw filter map. A pattern that
    /// fails to compile is logged and dropped, leaving an entry that can
    /// never match.
    pub fn compile(spec: &HashMap<String, Vec<String>>, context: &str) -> Self {
        let mut entries = Vec::new();
        for tag in FILTER_TAGS {
            let Some(raw_patterns) = spec.get(tag) else {
                continue;
            };
            let mut patterns = Vec::with_capacity(raw_patterns.len());
            for raw in raw_patterns {
                match Regex::new(raw) {
                    Ok(regex) => patterns.push(regex),
                    Err(error) => {
                        tracing::warn!(%context, tag, pattern = %raw, %error, "invalid filter pattern, treated as never matching");
                    }
                }
            }
            entries.push(FilterEntry { tag, patterns });
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decide whether an object is visible through a positive/negative filter
/// pair. Pure and reentrant.
pub fn matches(object: &impl TagSource, filters: &CompiledFilters, negative: &CompiledFilters) -> bool {
    for entry in &filters.entries {
        let Some(value) = object.tag_value(entry.tag) else {
            // Required tag absent.
            return false;
        };
        if !entry.patterns.iter().any(|p| p.is_match(&value)) {
            return false;
        }
    }
    for entry in &negative.entries {
        if let Some(value) = object.tag_value(entry.tag) {
            if entry.patterns.iter().any(|p| p.is_match(&value)) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
