//! Snapshot merge rules.
//!
//! The remote snapshot is authoritative for everything it knows about;
//! local-only additions survive.  Concretely:
//!
//! - tasks are unioned by id, remote winning field by field (an absent
//!   remote delivery date does not erase a locally set one); tasks only
//!   the remote knows are added, tasks only we know are kept;
//! - cell assignments are shallow-merged, the remote record replacing
//!   the local one wholesale per key;
//! - the change log keeps the remote history as its prefix and appends
//!   local entries whose ids the remote has not seen.
//!
//! Pure functions; the caller decides when (and whether) to apply the
//! result.

use std::collections::HashSet;

use cadence_shared::{CellMap, ChangeLogEntry, SharedSnapshot, TaskRecord};

/// The computed result of a merge, ready to be applied atomically.
#[derive(Debug)]
pub struct MergedState {
    pub tasks: Vec<TaskRecord>,
    pub cells: CellMap,
    pub change_log: Vec<ChangeLogEntry>,
}

/// Merge a remote snapshot over local state.
pub fn merge_snapshot(
    local_tasks: &[TaskRecord],
    local_cells: &CellMap,
    local_log: &[ChangeLogEntry],
    remote: &SharedSnapshot,
) -> MergedState {
    MergedState {
        tasks: merge_tasks(local_tasks, &remote.tasks),
        cells: merge_cells(local_cells, &remote.cell_data),
        change_log: merge_change_log(local_log, &remote.change_log),
    }
}

fn merge_tasks(local: &[TaskRecord], remote: &[TaskRecord]) -> Vec<TaskRecord> {
    // Remote order is authoritative; local-only tasks append in local order.
    let mut merged: Vec<TaskRecord> = remote
        .iter()
        .map(|r| {
            let mut task = r.clone();
            if task.delivery_date.is_none() {
                if let Some(l) = local.iter().find(|l| l.id == r.id) {
                    task.delivery_date = l.delivery_date;
                }
            }
            task
        })
        .collect();

    let remote_ids: HashSet<u64> = remote.iter().map(|t| t.id).collect();
    merged.extend(
        local
            .iter()
            .filter(|t| !remote_ids.contains(&t.id))
            .cloned(),
    );
    merged
}

fn merge_cells(local: &CellMap, remote: &CellMap) -> CellMap {
    let mut merged = local.clone();
    // Remote records replace local ones wholesale; no field-level merge
    // at cell granularity.
    merged.extend(remote.iter().map(|(k, v)| (*k, v.clone())));
    merged
}

fn merge_change_log(local: &[ChangeLogEntry], remote: &[ChangeLogEntry]) -> Vec<ChangeLogEntry> {
    let remote_ids: HashSet<_> = remote.iter().map(|e| e.id).collect();
    let mut merged = remote.to_vec();
    merged.extend(
        local
            .iter()
            .filter(|e| !remote_ids.contains(&e.id))
            .cloned(),
    );
    merged
}
