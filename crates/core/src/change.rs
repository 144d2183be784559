// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive change vocabulary: trigger levels and the events the
//! dispatcher consumes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource granularity at which a module observes events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerLevel {
    Patient,
    Study,
    Series,
}

impl TriggerLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerLevel::Patient => "Patient",
            TriggerLevel::Study => "Study",
            TriggerLevel::Series => "Series",
        }
    }
}

impl fmt::Display for TriggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive change kinds the dispatcher consumes. Everything else in the
/// archive's change feed is ignored at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    StablePatient,
    StableStudy,
    StableSeries,
}

impl ChangeKind {
    /// Map an archive change-type string onto a consumed kind.
    pub fn from_archive(change_type: &str) -> Option<Self> {
        match change_type {
            "StablePatient" => Some(ChangeKind::StablePatient),
            "StableStudy" => Some(ChangeKind::StableStudy),
            "StableSeries" => Some(ChangeKind::StableSeries),
            _ => None,
        }
    }

    /// The trigger level a module must declare to see this event.
    pub fn level(&self) -> TriggerLevel {
        match self {
            ChangeKind::StablePatient => TriggerLevel::Patient,
            ChangeKind::StableStudy => TriggerLevel::Study,
            ChangeKind::StableSeries => TriggerLevel::Series,
        }
    }
}

/// A stable event delivered to the runtime.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub resource_id: String,
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
