// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change feed intake: poll the archive change feed and forward the stable
//! events the dispatcher consumes.

use sift_adapters::{ChangeEntry, OrthancAdapter};
use sift_core::{ChangeEvent, ChangeKind};
use sift_engine::Message;
use std::time::Duration;
use tokio::sync::mpsc;

const PAGE_LIMIT: u32 = 100;
const IDLE_DELAY: Duration = Duration::from_millis(500);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Translate one change feed entry; non-stable changes are ignored.
fn to_message(entry: &ChangeEntry) -> Option<Message> {
    let kind = ChangeKind::from_archive(&entry.change_type)?;
    Some(Message::Change(ChangeEvent { kind, resource_id: entry.id.clone() }))
}

/// Poll the change feed forever, starting at the current tail: changes
/// that predate this daemon are not ours to replay. Ends when the runtime
/// goes away.
pub async fn watch_changes(archive: OrthancAdapter, tx: mpsc::Sender<Message>) {
    let mut since = match archive.latest_change().await {
        Ok(batch) => batch.last,
        Err(error) => {
            tracing::warn!(%error, "cannot read change feed tail, starting from zero");
            0
        }
    };

    loop {
        match archive.changes(since, PAGE_LIMIT).await {
            Ok(batch) => {
                for entry in &batch.changes {
                    let Some(message) = to_message(entry) else {
                        continue;
                    };
                    if tx.send(message).await.is_err() {
                        return;
                    }
                }
                since = since.max(batch.last);
                if batch.done {
                    tokio::time::sleep(IDLE_DELAY).await;
                }
            }
            Err(error) => {
                tracing::warn!(%error, "change feed unavailable, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
