// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn entry(change_type: &str, id: &str) -> ChangeEntry {
    ChangeEntry { change_type: change_type.to_string(), id: id.to_string(), seq: 1 }
}

#[yare::parameterized(
    series = { "StableSeries", ChangeKind::StableSeries },
    study = { "StableStudy", ChangeKind::StableStudy },
    patient = { "StablePatient", ChangeKind::StablePatient },
)]
fn stable_entries_become_change_messages(change_type: &str, kind: ChangeKind) {
    match to_message(&entry(change_type, "res-1")) {
        Some(Message::Change(event)) => {
            assert_eq!(event.kind, kind);
            assert_eq!(event.resource_id, "res-1");
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[yare::parameterized(
    new_instance = { "NewInstance" },
    new_series = { "NewSeries" },
    deleted = { "Deleted" },
    updated = { "UpdatedAttachment" },
)]
fn other_entries_are_dropped(change_type: &str) {
    assert!(to_message(&entry(change_type, "res-1")).is_none());
}
