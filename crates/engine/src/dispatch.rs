// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event dispatch: materialize the resource tree, separate origins, run
//! matching modules, forward their output, clean up.

use crate::error::EngineError;
use crate::runtime::Runtime;
use sift_adapters::{ArchiveAdapter, ModuleHost};
use sift_core::{ChangeEvent, ChangeKind, DicomFile, Tree, TriggerLevel};
use std::collections::HashSet;
use std::sync::Arc;

impl<A: ArchiveAdapter, H: ModuleHost> Runtime<A, H> {
    /// Entry point for one stable event. Refreshes the architecture first
    /// (the actor serializes this with ticker refreshes), then dispatches;
    /// an archive failure abandons the event without taking the daemon
    /// down.
    pub(crate) async fn handle_change(&mut self, event: ChangeEvent) {
        self.update_architecture().await;
        tracing::info!(level = %event.kind.level(), resource = %event.resource_id, "stable event");
        if let Err(error) = self.dispatch(&event).await {
            tracing::warn!(
                level = %event.kind.level(),
                resource = %event.resource_id,
                %error,
                "event abandoned"
            );
        }
    }

    async fn dispatch(&mut self, event: &ChangeEvent) -> Result<(), EngineError> {
        let Some(config) = &self.main_config else {
            tracing::debug!("no main configuration, ignoring event");
            return Ok(());
        };
        let auto_remove = config.auto_remove;
        let level = event.kind.level();

        let (internal, external) = self.expand_and_split(event).await?;

        if !internal.is_empty() {
            // Echo of our own output: no modules run. The last event for a
            // cycle is the patient-level one; that is where we collect.
            if level == TriggerLevel::Patient && auto_remove {
                let ids = internal.into_flat();
                tracing::debug!(count = ids.len(), "removing internally produced instances");
                self.archive.bulk_delete(&ids).await?;
            }
            return Ok(());
        }

        self.dispatch_external(level, &external).await?;

        if level == TriggerLevel::Patient && auto_remove {
            let ids = external.into_flat();
            if !ids.is_empty() {
                tracing::debug!(count = ids.len(), "removing processed instances");
                self.archive.bulk_delete(&ids).await?;
            }
        }
        Ok(())
    }

    /// Expand the event's resource level by level down to instances,
    /// resolving each instance's origin once along the way, then partition
    /// the ids into two trees of equal shape: (internal, external).
    async fn expand_and_split(
        &self,
        event: &ChangeEvent,
    ) -> Result<(Tree<String>, Tree<String>), EngineError> {
        let study_series: Vec<Vec<String>> = match event.kind {
            ChangeKind::StableSeries => vec![vec![event.resource_id.clone()]],
            ChangeKind::StableStudy => {
                vec![self.archive.list_series(&event.resource_id).await?]
            }
            ChangeKind::StablePatient => {
                let mut out = Vec::new();
                for study_id in self.archive.list_studies(&event.resource_id).await? {
                    out.push(self.archive.list_series(&study_id).await?);
                }
                out
            }
        };

        let mut studies = Vec::with_capacity(study_series.len());
        let mut internal_ids = HashSet::new();
        for series_ids in study_series {
            let mut study = Vec::with_capacity(series_ids.len());
            for series_id in series_ids {
                let instances = self.archive.list_instances(&series_id).await?;
                for instance_id in &instances {
                    let metadata = self.archive.instance_metadata(instance_id).await?;
                    if metadata.is_internal() {
                        internal_ids.insert(instance_id.clone());
                    }
                }
                study.push(instances);
            }
            studies.push(study);
        }
        Ok(Tree::from_studies(studies).split(|id| internal_ids.contains(id)))
    }

    async fn dispatch_external(
        &mut self,
        level: TriggerLevel,
        external: &Tree<String>,
    ) -> Result<(), EngineError> {
        let Some(first) = external.first() else {
            tracing::debug!("event carries no instances");
            return Ok(());
        };

        // Sender identity comes from the first external instance.
        let metadata = self.archive.instance_metadata(first).await?;
        let called_aet = metadata.called_aet;
        let remote_aet = metadata.remote_aet.unwrap_or_default();

        let candidates: Vec<String> = self
            .registry
            .iter()
            .filter_map(|module| {
                let config = module.config()?;
                (config.trigger_level == level
                    && Some(&config.calling_aet) == called_aet.as_ref())
                .then(|| module.id().to_string())
            })
            .collect();
        if candidates.is_empty() {
            tracing::debug!(called_aet = called_aet.as_deref().unwrap_or(""), "no module to call");
            return Ok(());
        }

        // Fetch every external instance exactly once; instances that fail
        // to fetch or parse drop from the module view, not from cleanup.
        let mut studies = Vec::with_capacity(external.studies().len());
        for study in external.studies() {
            let mut out_study = Vec::with_capacity(study.len());
            for series in study {
                let mut out_series = Vec::with_capacity(series.len());
                for instance_id in series {
                    match self.archive.fetch_instance(instance_id).await {
                        Ok(file) => out_series.push(Arc::new(file)),
                        Err(error) => {
                            tracing::warn!(instance = %instance_id, %error, "skipping unreadable instance");
                        }
                    }
                }
                out_study.push(out_series);
            }
            studies.push(out_study);
        }
        let files: Tree<Arc<DicomFile>> = Tree::from_studies(studies);

        for module_id in candidates {
            let Some(module) = self.registry.get_mut(&module_id) else {
                continue;
            };
            let Some(config) = module.config() else {
                continue;
            };
            let filters = config.filters.clone();
            let negative = config.negative_filters.clone();
            let destination = config.destination_name.clone();

            let batch = files
                .project(|file| {
                    sift_core::matches(file.as_ref(), &filters, &negative)
                        .then(|| Arc::clone(file))
                })
                .prune();
            if batch.is_empty() {
                tracing::debug!(module = %module_id, "no files left after filters");
                continue;
            }

            tracing::info!(module = %module_id, %level, files = batch.len(), "calling module");
            let outcome = module.process(level, &batch, &remote_aet).await;
            match outcome {
                Ok(produced) if !produced.is_empty() => {
                    self.forward(&module_id, produced, &destination).await;
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(module = %module_id, %error, "error during module processing");
                }
            }
        }
        Ok(())
    }

    /// Submit produced files to the archive and issue one store to the
    /// module's destination. Partial failures keep as much as possible.
    async fn forward(&self, module_id: &str, produced: Vec<Vec<u8>>, destination: &str) {
        let mut instance_ids = Vec::with_capacity(produced.len());
        for bytes in produced {
            match self.archive.submit_instance(bytes).await {
                Ok(id) => instance_ids.push(id),
                Err(error) => {
                    tracing::warn!(module = %module_id, %error, "cannot submit produced instance");
                }
            }
        }
        if instance_ids.is_empty() {
            return;
        }
        if let Err(error) = self.archive.store_to_modality(destination, &instance_ids).await {
            tracing::warn!(module = %module_id, destination, %error, "cannot store to destination");
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
