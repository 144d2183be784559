// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The set of loaded modules, keyed by module id.
//!
//! Discovery is a filesystem glob resolved against the main configuration's
//! directory. A crawl reload-checks known modules, loads new ones, and
//! purges tombstones; per-module failures never abort the pass. Modules
//! that vanish from the glob stay loaded until a reload fails.

use crate::error::EngineError;
use crate::module::Module;
use sift_adapters::ModuleHost;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct ModuleRegistry<H: ModuleHost> {
    host: H,
    modules: BTreeMap<String, Module<H>>,
}

impl<H: ModuleHost> ModuleRegistry<H> {
    pub fn new(host: H) -> Self {
        Self { host, modules: BTreeMap::new() }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Module<H>> {
        self.modules.values()
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Module<H>> {
        self.modules.get_mut(id)
    }

    /// One discovery pass over the module glob.
    pub async fn crawl(&mut self, config_dir: &Path, pattern: &str) {
        let full_pattern = config_dir.join(pattern);
        let paths = match glob::glob(&full_pattern.to_string_lossy()) {
            Ok(paths) => paths,
            Err(error) => {
                tracing::warn!(pattern = %full_pattern.display(), %error, "bad module glob");
                return;
            }
        };

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(error) => {
                    tracing::warn!(%error, "unreadable glob entry");
                    continue;
                }
            };
            let Some(id) = module_id(&path) else {
                continue;
            };
            if let Err(error) = self.load_or_refresh(id.clone(), path).await {
                tracing::warn!(module = %id, %error, "error while loading module");
            }
        }

        self.gc();
    }

    async fn load_or_refresh(&mut self, id: String, path: PathBuf) -> Result<(), EngineError> {
        match self.modules.get_mut(&id) {
            Some(module) => module.check_update().await,
            None => {
                let module = Module::load(self.host.clone(), id.clone(), path).await?;
                self.modules.insert(id, module);
                Ok(())
            }
        }
    }

    /// Purge tombstoned descriptors.
    fn gc(&mut self) {
        self.modules.retain(|_, module| module.is_loaded());
    }
}

/// Module identity: file stem of the code file.
fn module_id(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
