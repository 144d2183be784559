// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime actor.
//!
//! One task owns the registry and the main configuration and drains a
//! single channel of archive events, lifecycle transitions, and refresh
//! ticks. Serialization through the channel is the reload gate: a tick
//! queued behind an event callback runs only after the callback returns.

use crate::registry::ModuleRegistry;
use sift_adapters::{ArchiveAdapter, ModuleHost};
use sift_core::{hash, ChangeEvent, MainConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Everything the actor consumes.
#[derive(Debug)]
pub enum Message {
    /// A stable event from the archive change feed.
    Change(ChangeEvent),
    /// Archive lifecycle started: load the architecture, arm the ticker.
    Started,
    /// Archive lifecycle stopped: disarm the ticker and wind down.
    Stopped,
    /// Periodic refresh.
    Tick,
}

struct Ticker {
    handle: JoinHandle<()>,
    period: Duration,
}

/// The dispatcher runtime. Owns all mutable state; driven by [`Runtime::run`].
pub struct Runtime<A: ArchiveAdapter, H: ModuleHost> {
    pub(crate) archive: A,
    pub(crate) config_path: PathBuf,
    pub(crate) config_dir: PathBuf,
    pub(crate) main_config: Option<MainConfig>,
    pub(crate) config_hash: Option<String>,
    pub(crate) registry: ModuleRegistry<H>,
    tick_tx: mpsc::Sender<Message>,
    ticker: Option<Ticker>,
}

impl<A: ArchiveAdapter, H: ModuleHost> Runtime<A, H> {
    /// `tick_tx` must be a sender onto the same channel whose receiver is
    /// handed to [`Runtime::run`]; the ticker feeds itself back through it.
    pub fn new(archive: A, host: H, config_path: PathBuf, tick_tx: mpsc::Sender<Message>) -> Self {
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            archive,
            config_path,
            config_dir,
            main_config: None,
            config_hash: None,
            registry: ModuleRegistry::new(host),
            tick_tx,
            ticker: None,
        }
    }

    /// Drain the message channel until `Stopped` or channel close.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Started => {
                    tracing::info!("archive lifecycle started");
                    self.update_architecture().await;
                    self.arm_ticker();
                }
                Message::Stopped => {
                    tracing::info!("archive lifecycle stopped");
                    break;
                }
                Message::Tick => self.update_architecture().await,
                Message::Change(event) => self.handle_change(event).await,
            }
        }
        self.disarm_ticker();
    }

    /// Re-hash the main configuration, re-read it on change, and crawl the
    /// registry. A configuration that fails to load leaves the previous
    /// valid one in effect and skips the crawl for this round.
    pub(crate) async fn update_architecture(&mut self) {
        let disk_hash = match hash::file_digest(&self.config_path) {
            Ok(digest) => digest,
            Err(error) => {
                tracing::warn!(path = %self.config_path.display(), %error, "cannot read main configuration");
                return;
            }
        };
        if Some(&disk_hash) != self.config_hash.as_ref() {
            match MainConfig::load(&self.config_path) {
                Ok(config) => {
                    tracing::info!(path = %self.config_path.display(), "main configuration loaded");
                    self.main_config = Some(config);
                    self.config_hash = Some(disk_hash);
                    self.rearm_ticker();
                }
                Err(error) => {
                    tracing::warn!(%error, "error during loading config");
                    return;
                }
            }
        }

        let Some(module_glob) = self.main_config.as_ref().map(|c| c.module_glob.clone()) else {
            return;
        };
        self.registry.crawl(&self.config_dir, &module_glob).await;
    }

    fn arm_ticker(&mut self) {
        let Some(config) = &self.main_config else {
            tracing::warn!("no usable main configuration, refresh ticker not armed");
            return;
        };
        let period = config.reload_period();
        if let Some(ticker) = &self.ticker {
            if ticker.period == period {
                return;
            }
        }
        self.disarm_ticker();
        let tx = self.tick_tx.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(Message::Tick).await.is_err() {
                    break;
                }
            }
        });
        self.ticker = Some(Ticker { handle, period });
        tracing::debug!(period_s = period.as_secs_f64(), "refresh ticker armed");
    }

    /// Pick up a changed `AutoReloadEach` without waiting for a restart.
    fn rearm_ticker(&mut self) {
        if self.ticker.is_some() {
            self.arm_ticker();
        }
    }

    fn disarm_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
