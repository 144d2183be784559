// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive access contract.
//!
//! Everything the dispatch core needs from the downstream DICOM archive
//! goes through this trait; failures are non-fatal to the daemon.

use async_trait::async_trait;
use serde::Deserialize;
use sift_core::DicomFile;
use thiserror::Error;

/// Origin value the archive assigns to instances this daemon submitted.
pub const INTERNAL_ORIGIN: &str = "Plugins";

/// Errors from archive operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cannot parse DICOM for instance {id}: {message}")]
    Dicom { id: String, message: String },
    #[error("archive has no {0}")]
    NotFound(String),
}

/// The slice of instance metadata the dispatcher reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceMetadata {
    #[serde(rename = "Origin", default)]
    pub origin: String,
    #[serde(rename = "CalledAET", default)]
    pub called_aet: Option<String>,
    #[serde(rename = "RemoteAET", default)]
    pub remote_aet: Option<String>,
}

impl InstanceMetadata {
    /// True when the instance was produced by this daemon. Classification
    /// relies on `Origin` alone; `CalledAET` plays no part.
    pub fn is_internal(&self) -> bool {
        self.origin == INTERNAL_ORIGIN
    }
}

/// Adapter for the downstream archive.
#[async_trait]
pub trait ArchiveAdapter: Send + Sync + 'static {
    async fn list_studies(&self, patient_id: &str) -> Result<Vec<String>, ArchiveError>;
    async fn list_series(&self, study_id: &str) -> Result<Vec<String>, ArchiveError>;
    async fn list_instances(&self, series_id: &str) -> Result<Vec<String>, ArchiveError>;
    async fn instance_metadata(&self, instance_id: &str)
        -> Result<InstanceMetadata, ArchiveError>;
    /// Fetch and parse one instance's DICOM file.
    async fn fetch_instance(&self, instance_id: &str) -> Result<DicomFile, ArchiveError>;
    /// Submit a DICOM file, returning the instance id the archive assigned.
    async fn submit_instance(&self, bytes: Vec<u8>) -> Result<String, ArchiveError>;
    /// Store instances to a configured modality by name.
    async fn store_to_modality(
        &self,
        destination: &str,
        instance_ids: &[String],
    ) -> Result<(), ArchiveError>;
    async fn bulk_delete(&self, instance_ids: &[String]) -> Result<(), ArchiveError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ArchiveAdapter, ArchiveError, InstanceMetadata};
    use async_trait::async_trait;
    use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
    use dicom::dictionary_std::tags;
    use parking_lot::Mutex;
    use sift_core::{DicomData, DicomFile};
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    /// Build an in-memory instance for tests from (tag name, value) pairs.
    /// Tag names outside the small set used by tests are ignored.
    pub fn dicom_file(id: &str, tag_values: &[(&str, &str)]) -> DicomFile {
        let mut data = DicomData::new_empty();
        for (name, value) in tag_values {
            if let Some((tag, vr)) = known_tag(name) {
                data.put(DataElement::new(tag, vr, PrimitiveValue::from(*value)));
            }
        }
        DicomFile { id: id.to_string(), bytes: format!("DCM:{id}").into_bytes(), data }
    }

    fn known_tag(name: &str) -> Option<(Tag, VR)> {
        match name {
            "Modality" => Some((tags::MODALITY, VR::CS)),
            "ImageType" => Some((tags::IMAGE_TYPE, VR::CS)),
            "SeriesDescription" => Some((tags::SERIES_DESCRIPTION, VR::LO)),
            "StudyDescription" => Some((tags::STUDY_DESCRIPTION, VR::LO)),
            "PatientName" => Some((tags::PATIENT_NAME, VR::PN)),
            "PatientID" => Some((tags::PATIENT_ID, VR::LO)),
            "AccessionNumber" => Some((tags::ACCESSION_NUMBER, VR::SH)),
            "InstitutionName" => Some((tags::INSTITUTION_NAME, VR::LO)),
            "Manufacturer" => Some((tags::MANUFACTURER, VR::LO)),
            "ProtocolName" => Some((tags::PROTOCOL_NAME, VR::LO)),
            "StudyID" => Some((tags::STUDY_ID, VR::SH)),
            _ => None,
        }
    }

    #[derive(Default)]
    struct FakeArchiveState {
        studies: HashMap<String, Vec<String>>,
        series: HashMap<String, Vec<String>>,
        instances: HashMap<String, Vec<String>>,
        metadata: HashMap<String, InstanceMetadata>,
        files: HashMap<String, DicomFile>,
        fail_fetch: HashSet<String>,
        submitted: Vec<Vec<u8>>,
        stored: Vec<(String, Vec<String>)>,
        deleted: Vec<Vec<String>>,
        next_id: u32,
    }

    /// In-memory archive for tests, recording every mutating call.
    #[derive(Clone, Default)]
    pub struct FakeArchiveAdapter {
        inner: Arc<Mutex<FakeArchiveState>>,
    }

    impl FakeArchiveAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a patient → study → series chain with its instances.
        pub fn add_series(&self, patient: &str, study: &str, series: &str, instances: &[&str]) {
            let mut state = self.inner.lock();
            let studies = state.studies.entry(patient.to_string()).or_default();
            if !studies.iter().any(|s| s == study) {
                studies.push(study.to_string());
            }
            let series_list = state.series.entry(study.to_string()).or_default();
            if !series_list.iter().any(|s| s == series) {
                series_list.push(series.to_string());
            }
            state
                .instances
                .entry(series.to_string())
                .or_default()
                .extend(instances.iter().map(|i| i.to_string()));
        }

        pub fn set_metadata(
            &self,
            instance: &str,
            origin: &str,
            called_aet: Option<&str>,
            remote_aet: Option<&str>,
        ) {
            self.inner.lock().metadata.insert(
                instance.to_string(),
                InstanceMetadata {
                    origin: origin.to_string(),
                    called_aet: called_aet.map(str::to_string),
                    remote_aet: remote_aet.map(str::to_string),
                },
            );
        }

        pub fn set_file(&self, file: DicomFile) {
            self.inner.lock().files.insert(file.id.clone(), file);
        }

        /// Make `fetch_instance` fail for one instance id.
        pub fn fail_fetch(&self, instance: &str) {
            self.inner.lock().fail_fetch.insert(instance.to_string());
        }

        pub fn submitted(&self) -> Vec<Vec<u8>> {
            self.inner.lock().submitted.clone()
        }

        pub fn stored(&self) -> Vec<(String, Vec<String>)> {
            self.inner.lock().stored.clone()
        }

        pub fn deleted(&self) -> Vec<Vec<String>> {
            self.inner.lock().deleted.clone()
        }
    }

    #[async_trait]
    impl ArchiveAdapter for FakeArchiveAdapter {
        async fn list_studies(&self, patient_id: &str) -> Result<Vec<String>, ArchiveError> {
            self.inner
                .lock()
                .studies
                .get(patient_id)
                .cloned()
                .ok_or_else(|| ArchiveError::NotFound(format!("patient {patient_id}")))
        }

        async fn list_series(&self, study_id: &str) -> Result<Vec<String>, ArchiveError> {
            self.inner
                .lock()
                .series
                .get(study_id)
                .cloned()
                .ok_or_else(|| ArchiveError::NotFound(format!("study {study_id}")))
        }

        async fn list_instances(&self, series_id: &str) -> Result<Vec<String>, ArchiveError> {
            self.inner
                .lock()
                .instances
                .get(series_id)
                .cloned()
                .ok_or_else(|| ArchiveError::NotFound(format!("series {series_id}")))
        }

        async fn instance_metadata(
            &self,
            instance_id: &str,
        ) -> Result<InstanceMetadata, ArchiveError> {
            self.inner
                .lock()
                .metadata
                .get(instance_id)
                .cloned()
                .ok_or_else(|| ArchiveError::NotFound(format!("instance {instance_id}")))
        }

        async fn fetch_instance(&self, instance_id: &str) -> Result<DicomFile, ArchiveError> {
            let state = self.inner.lock();
            if state.fail_fetch.contains(instance_id) {
                return Err(ArchiveError::NotFound(format!("instance {instance_id}")));
            }
            state
                .files
                .get(instance_id)
                .cloned()
                .ok_or_else(|| ArchiveError::NotFound(format!("instance {instance_id}")))
        }

        async fn submit_instance(&self, bytes: Vec<u8>) -> Result<String, ArchiveError> {
            let mut state = self.inner.lock();
            state.next_id += 1;
            let id = format!("gen-{}", state.next_id);
            state.submitted.push(bytes);
            state.metadata.insert(
                id.clone(),
                InstanceMetadata {
                    origin: super::INTERNAL_ORIGIN.to_string(),
                    called_aet: None,
                    remote_aet: None,
                },
            );
            Ok(id)
        }

        async fn store_to_modality(
            &self,
            destination: &str,
            instance_ids: &[String],
        ) -> Result<(), ArchiveError> {
            self.inner
                .lock()
                .stored
                .push((destination.to_string(), instance_ids.to_vec()));
            Ok(())
        }

        async fn bulk_delete(&self, instance_ids: &[String]) -> Result<(), ArchiveError> {
            self.inner.lock().deleted.push(instance_ids.to_vec());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{dicom_file, FakeArchiveAdapter};
