//! Tracker domain model: tasks, per-week cell assignments, the audit log,
//! and the snapshot document exchanged with the shared store.
//!
//! Wire names are camelCase to match the JSON data file format; cell keys
//! serialize as `"<taskId>-<weekIndex>"` strings so the cell map survives
//! JSON encoding.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// The four fixed task categories of the tracker grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Roadmap,
    Audit,
    Maintenance,
    Advocacy,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Roadmap,
        Category::Audit,
        Category::Maintenance,
        Category::Advocacy,
    ];

    /// Human-readable column header.
    pub fn label(self) -> &'static str {
        match self {
            Category::Roadmap => "Roadmap",
            Category::Audit => "Audit",
            Category::Maintenance => "Maintenance",
            Category::Advocacy => "Advocacy & Training",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

/// A task row on the grid. Ids are unique and allocated monotonically by
/// the local store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: u64,
    pub name: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// Key of one cell on the grid: a task crossed with a week column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub task_id: u64,
    pub week: u32,
}

impl CellKey {
    pub fn new(task_id: u64, week: u32) -> Self {
        Self { task_id, week }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.task_id, self.week)
    }
}

impl FromStr for CellKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (task, week) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid cell key: {s}"))?;
        Ok(Self {
            task_id: task.parse().map_err(|_| format!("invalid task id in cell key: {s}"))?,
            week: week.parse().map_err(|_| format!("invalid week in cell key: {s}"))?,
        })
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Scheduling state of a cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CellStatus {
    Planned,
    InProgress,
    Completed,
    Blocked,
    Delayed,
}

impl CellStatus {
    /// Human-readable label, used in audit log messages.
    pub fn label(self) -> &'static str {
        match self {
            CellStatus::Planned => "planned",
            CellStatus::InProgress => "in progress",
            CellStatus::Completed => "completed",
            CellStatus::Blocked => "blocked",
            CellStatus::Delayed => "delayed",
        }
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value of a scheduled cell. A cell is scheduled iff either field is
/// set; clearing a cell removes the whole record, never one half.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CellAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CellStatus>,
}

impl CellAssignment {
    pub fn is_scheduled(&self) -> bool {
        self.assignee.is_some() || self.status.is_some()
    }
}

/// The full cell map, ordered by key for stable snapshot serialization.
pub type CellMap = BTreeMap<CellKey, CellAssignment>;

// ---------------------------------------------------------------------------
// Change log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Login,
    Logout,
    Assignment,
    StatusChange,
    TaskCreated,
    TaskEdited,
    TaskDeleted,
    CellCleared,
}

/// One append-only audit record. Entries are write-once; the log as a
/// whole is cleared only by a full local data reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor_name: String,
    pub actor_id: String,
    pub action: ChangeAction,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
}

impl ChangeLogEntry {
    pub fn new(
        actor: &Identity,
        action: ChangeAction,
        details: impl Into<String>,
        task_id: Option<u64>,
        week: Option<u32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_name: actor.display_name.clone(),
            actor_id: actor.email.clone(),
            action,
            details: details.into(),
            task_id,
            week,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared snapshot
// ---------------------------------------------------------------------------

/// The whole-document unit exchanged with the remote store.
///
/// `last_updated` strictly increases across commits from well-behaved
/// clients and is the only ordering signal consumers may rely on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharedSnapshot {
    pub tasks: Vec<TaskRecord>,
    pub cell_data: CellMap,
    pub change_log: Vec<ChangeLogEntry>,
    pub last_updated: DateTime<Utc>,
    pub committed_by: Identity,
}
