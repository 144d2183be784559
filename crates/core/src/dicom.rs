// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The core's view of a DICOM object.
//!
//! Parsing and serialization live at the adapter edge; the dispatch core
//! only ever reads named string attributes (for filtering) and carries the
//! raw bytes through to modules untouched.

use dicom::object::{InMemDicomObject, StandardDataDictionary};

/// In-memory DICOM data set, standard dictionary.
pub type DicomData = InMemDicomObject<StandardDataDictionary>;

/// One instance as fetched from the archive: its archive id, the raw file
/// bytes, and the parsed data set.
#[derive(Debug, Clone)]
pub struct DicomFile {
    pub id: String,
    pub bytes: Vec<u8>,
    pub data: DicomData,
}

/// Read access to named string attributes, as much of a DICOM object as
/// filtering needs.
pub trait TagSource {
    /// String form of the attribute, `None` when absent or not convertible.
    fn tag_value(&self, name: &str) -> Option<String>;
}

impl TagSource for DicomData {
    fn tag_value(&self, name: &str) -> Option<String> {
        let element = self.element_by_name(name).ok()?;
        element.to_str().ok().map(|value| value.into_owned())
    }
}

impl TagSource for DicomFile {
    fn tag_value(&self, name: &str) -> Option<String> {
        self.data.tag_value(name)
    }
}
