// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One loaded module: its configuration, content hashes, and the running
//! instance behind the host.
//!
//! A descriptor is either fully loaded (both hashes recorded, instance
//! running) or tombstoned; the registry purges tombstones after each
//! crawl.

use crate::error::EngineError;
use sift_adapters::{LoadSpec, ModuleHost, ModuleInstance};
use sift_core::{hash, DicomFile, ModuleConfig, Tree, TriggerLevel};
use std::path::PathBuf;
use std::sync::Arc;

pub struct Module<H: ModuleHost> {
    id: String,
    code_path: PathBuf,
    config_path: PathBuf,
    code_hash: Option<String>,
    config_hash: Option<String>,
    config: Option<ModuleConfig>,
    instance: Option<H::Instance>,
    loaded: bool,
    host: H,
}

impl<H: ModuleHost> std::fmt::Debug for Module<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("code_path", &self.code_path)
            .field("config_path", &self.config_path)
            .field("code_hash", &self.code_hash)
            .field("config_hash", &self.config_hash)
            .field("config", &self.config)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl<H: ModuleHost> Module<H> {
    /// First-time load. On error there is no descriptor to keep.
    pub async fn load(host: H, id: String, code_path: PathBuf) -> Result<Self, EngineError> {
        let config_path = code_path.with_extension("json");
        let mut module = Self {
            id,
            code_path,
            config_path,
            code_hash: None,
            config_hash: None,
            config: None,
            instance: None,
            loaded: false,
            host,
        };
        module.load_full().await?;
        Ok(module)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn config(&self) -> Option<&ModuleConfig> {
        self.config.as_ref()
    }

    /// Re-read the configuration, re-validate, and restart the instance.
    async fn load_full(&mut self) -> Result<(), EngineError> {
        if !self.code_path.exists() {
            return Err(EngineError::MissingFile(self.code_path.clone()));
        }
        if !self.config_path.exists() {
            return Err(EngineError::MissingFile(self.config_path.clone()));
        }
        let config_hash = hash::file_digest(&self.config_path).map_err(|source| {
            EngineError::Hash { path: self.config_path.clone(), source }
        })?;
        let config = ModuleConfig::load(&self.config_path, &self.id)?;
        self.config = Some(config);
        self.config_hash = Some(config_hash);
        self.load_code().await
    }

    /// Restart the instance against the already-validated configuration.
    async fn load_code(&mut self) -> Result<(), EngineError> {
        let Some(config) = &self.config else {
            return Err(EngineError::MissingFile(self.config_path.clone()));
        };
        let code_hash = hash::file_digest(&self.code_path)
            .map_err(|source| EngineError::Hash { path: self.code_path.clone(), source })?;
        let instance = self
            .host
            .load(LoadSpec {
                module_id: &self.id,
                code_path: &self.code_path,
                class_name: &config.class_name,
                config: &config.raw,
            })
            .await?;
        self.instance = Some(instance);
        self.code_hash = Some(code_hash);
        self.loaded = true;
        tracing::info!(module = %self.id, "loaded module");
        Ok(())
    }

    /// Compare on-disk hashes with the recorded ones and reload what
    /// changed: configuration change reloads configuration and code, code
    /// change reloads code only. Failure leaves the descriptor tombstoned.
    pub async fn check_update(&mut self) -> Result<(), EngineError> {
        let disk_config = hash::file_digest(&self.config_path).map_err(|source| {
            EngineError::Hash { path: self.config_path.clone(), source }
        })?;
        if Some(&disk_config) != self.config_hash.as_ref() {
            self.instance = None;
            self.config = None;
            self.config_hash = None;
            self.code_hash = None;
            self.loaded = false;
            tracing::info!(module = %self.id, "configuration changed, reloading config and module");
            return self.load_full().await;
        }

        let disk_code = hash::file_digest(&self.code_path)
            .map_err(|source| EngineError::Hash { path: self.code_path.clone(), source })?;
        if Some(&disk_code) != self.code_hash.as_ref() {
            self.instance = None;
            self.code_hash = None;
            self.loaded = false;
            tracing::info!(module = %self.id, "code changed, reloading module");
            return self.load_code().await;
        }
        Ok(())
    }

    /// Forward a batch to the running instance. A tombstoned module
    /// produces nothing.
    pub async fn process(
        &mut self,
        level: TriggerLevel,
        files: &Tree<Arc<DicomFile>>,
        remote_aet: &str,
    ) -> Result<Vec<Vec<u8>>, EngineError> {
        match (&mut self.instance, self.loaded) {
            (Some(instance), true) => Ok(instance.process(level, files, remote_aet).await?),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
