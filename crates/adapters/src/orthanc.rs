// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orthanc REST implementation of the archive adapter, plus the change
//! feed the daemon polls for event intake.

use crate::archive::{ArchiveAdapter, ArchiveError, InstanceMetadata};
use async_trait::async_trait;
use serde::Deserialize;
use sift_core::DicomFile;

/// REST client for an Orthanc-compatible archive.
#[derive(Clone)]
pub struct OrthancAdapter {
    client: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct PatientResource {
    #[serde(rename = "Studies")]
    studies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StudyResource {
    #[serde(rename = "Series")]
    series: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesResource {
    #[serde(rename = "Instances")]
    instances: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitReply {
    #[serde(rename = "ID")]
    id: String,
}

/// One entry of the archive change feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEntry {
    #[serde(rename = "ChangeType")]
    pub change_type: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Seq")]
    pub seq: u64,
}

/// A page of the change feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeBatch {
    #[serde(rename = "Changes")]
    pub changes: Vec<ChangeEntry>,
    #[serde(rename = "Done")]
    pub done: bool,
    #[serde(rename = "Last")]
    pub last: u64,
}

impl OrthancAdapter {
    pub fn new(base_url: &str, username: Option<String>, password: Option<String>) -> Self {
        let auth = match (username, password) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (Some(user), None) => Some((user, String::new())),
            _ => None,
        };
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ArchiveError> {
        let response = self.get(path).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch one page of the archive change feed.
    pub async fn changes(&self, since: u64, limit: u32) -> Result<ChangeBatch, ArchiveError> {
        self.get_json(&format!("/changes?since={since}&limit={limit}")).await
    }

    /// The current tail of the change feed.
    pub async fn latest_change(&self) -> Result<ChangeBatch, ArchiveError> {
        self.get_json("/changes?last").await
    }
}

/// Parse a DICOM file payload as served by the archive. Payloads carry the
/// 128-byte preamble before the DICM magic; tolerate its absence.
fn parse_dicom(bytes: &[u8]) -> Result<sift_core::DicomData, String> {
    let stream = if bytes.len() >= 132 && &bytes[128..132] == b"DICM" {
        &bytes[128..]
    } else {
        bytes
    };
    dicom::object::from_reader(stream)
        .map(|object| object.into_inner())
        .map_err(|e| e.to_string())
}

#[async_trait]
impl ArchiveAdapter for OrthancAdapter {
    async fn list_studies(&self, patient_id: &str) -> Result<Vec<String>, ArchiveError> {
        let resource: PatientResource = self.get_json(&format!("/patients/{patient_id}")).await?;
        Ok(resource.studies)
    }

    async fn list_series(&self, study_id: &str) -> Result<Vec<String>, ArchiveError> {
        let resource: StudyResource = self.get_json(&format!("/studies/{study_id}")).await?;
        Ok(resource.series)
    }

    async fn list_instances(&self, series_id: &str) -> Result<Vec<String>, ArchiveError> {
        let resource: SeriesResource = self.get_json(&format!("/series/{series_id}")).await?;
        Ok(resource.instances)
    }

    async fn instance_metadata(
        &self,
        instance_id: &str,
    ) -> Result<InstanceMetadata, ArchiveError> {
        self.get_json(&format!("/instances/{instance_id}/metadata?expand")).await
    }

    async fn fetch_instance(&self, instance_id: &str) -> Result<DicomFile, ArchiveError> {
        let response = self
            .get(&format!("/instances/{instance_id}/file"))
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?.to_vec();
        let data = parse_dicom(&bytes).map_err(|message| ArchiveError::Dicom {
            id: instance_id.to_string(),
            message,
        })?;
        Ok(DicomFile { id: instance_id.to_string(), bytes, data })
    }

    async fn submit_instance(&self, bytes: Vec<u8>) -> Result<String, ArchiveError> {
        let response = self
            .post("/instances")
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;
        let reply: SubmitReply = response.json().await?;
        Ok(reply.id)
    }

    async fn store_to_modality(
        &self,
        destination: &str,
        instance_ids: &[String],
    ) -> Result<(), ArchiveError> {
        self.post(&format!("/modalities/{destination}/store"))
            .json(&serde_json::json!({ "Resources": instance_ids }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn bulk_delete(&self, instance_ids: &[String]) -> Result<(), ArchiveError> {
        self.post("/tools/bulk-delete")
            .json(&serde_json::json!({ "Resources": instance_ids }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "orthanc_tests.rs"]
mod tests;
