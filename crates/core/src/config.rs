// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Main and per-module configuration.
//!
//! Both documents are JSON with `//` line comments. Mandatory keys are
//! validated at construction; unknown keys are preserved in an extras map
//! (the per-module extras travel to the module verbatim at init).

use crate::change::TriggerLevel;
use crate::filter::CompiledFilters;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from reading or validating a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse `{path}`: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid configuration in `{path}`: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Read a JSON-with-comments document into a `serde_json::Value`.
pub fn read_jsonc(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let parsed = jsonc_parser::parse_to_serde_value(&text, &jsonc_parser::ParseOptions::default())
        .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })?;
    parsed.ok_or_else(|| ConfigError::Parse {
        path: path.to_path_buf(),
        message: "empty document".to_string(),
    })
}

/// Archive endpoint assumed when the configuration names none.
pub const DEFAULT_ARCHIVE_URL: &str = "http://127.0.0.1:8042";

fn default_archive_url() -> String {
    DEFAULT_ARCHIVE_URL.to_string()
}

/// The daemon's main configuration, a sibling of the executable.
#[derive(Debug, Clone, Deserialize)]
pub struct MainConfig {
    /// Glob locating module code files, relative to this file's directory.
    #[serde(rename = "ModuleLoadingHeuristic")]
    pub module_glob: String,
    /// Delete originals (and our own output) after a patient-level cycle.
    #[serde(rename = "AutoRemove")]
    pub auto_remove: bool,
    /// Refresh ticker period, seconds.
    #[serde(rename = "AutoReloadEach")]
    pub auto_reload_each: f64,
    #[serde(rename = "ArchiveUrl", default = "default_archive_url")]
    pub archive_url: String,
    #[serde(rename = "ArchiveUsername", default)]
    pub archive_username: Option<String>,
    #[serde(rename = "ArchivePassword", default)]
    pub archive_password: Option<String>,
    #[serde(flatten)]
    pub extras: serde_json::Map<String, Value>,
}

impl MainConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let value = read_jsonc(path)?;
        let config: MainConfig = serde_json::from_value(value)
            .map_err(|e| ConfigError::Invalid { path: path.to_path_buf(), message: e.to_string() })?;
        if !(config.auto_reload_each.is_finite() && config.auto_reload_each > 0.0) {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "AutoReloadEach must be a positive number of seconds".to_string(),
            });
        }
        Ok(config)
    }

    pub fn reload_period(&self) -> Duration {
        Duration::from_secs_f64(self.auto_reload_each)
    }
}

/// Raw filter map as written in a module configuration.
pub type FilterSpec = HashMap<String, Vec<String>>;

#[derive(Debug, Deserialize)]
struct RawModuleConfig {
    #[serde(rename = "TriggerLevel")]
    trigger_level: TriggerLevel,
    #[serde(rename = "ClassName")]
    class_name: String,
    #[serde(rename = "CallingAET")]
    calling_aet: String,
    #[serde(rename = "DestinationName")]
    destination_name: String,
    #[serde(rename = "Filters", default)]
    filters: FilterSpec,
    #[serde(rename = "NegativeFilters", default)]
    negative_filters: FilterSpec,
}

/// A validated module configuration.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    pub trigger_level: TriggerLevel,
    pub class_name: String,
    pub calling_aet: String,
    pub destination_name: String,
    pub filters: CompiledFilters,
    pub negative_filters: CompiledFilters,
    /// The document as read, module-private keys included; handed to the
    /// module at init.
    pub raw: serde_json::Map<String, Value>,
}

impl ModuleConfig {
    /// Load and validate a module's companion configuration file.
    pub fn load(path: &Path, module_id: &str) -> Result<Self, ConfigError> {
        let value = read_jsonc(path)?;
        Self::from_value(value, path, module_id)
    }

    fn from_value(value: Value, path: &Path, module_id: &str) -> Result<Self, ConfigError> {
        let raw = value
            .as_object()
            .cloned()
            .ok_or_else(|| ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "expected a JSON object".to_string(),
            })?;
        let parsed: RawModuleConfig = serde_json::from_value(value)
            .map_err(|e| ConfigError::Invalid { path: path.to_path_buf(), message: e.to_string() })?;
        Ok(Self {
            trigger_level: parsed.trigger_level,
            class_name: parsed.class_name,
            calling_aet: parsed.calling_aet,
            destination_name: parsed.destination_name,
            filters: CompiledFilters::compile(&parsed.filters, module_id),
            negative_filters: CompiledFilters::compile(&parsed.negative_filters, module_id),
            raw,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
