//! In-memory tracker state and its operations.
//!
//! One browser tab (or one CLI process) owns a [`TrackerStore`]
//! exclusively.  Every mutation appends an audit entry naming the actor
//! and raises the dirty flag; the sync engine lowers it again after a
//! successful push.

use std::collections::BTreeSet;

use cadence_shared::constants::{BLOB_CELL_DATA, BLOB_CHANGE_LOG, BLOB_COLLAPSED, BLOB_TASKS};
use cadence_shared::{
    CellAssignment, CellKey, CellMap, CellStatus, Category, ChangeAction, ChangeLogEntry,
    Identity, Priority, SharedSnapshot, TaskRecord,
};
use chrono::{NaiveDate, Utc};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// The complete client-local tracker state.
#[derive(Debug, Default)]
pub struct TrackerStore {
    tasks: Vec<TaskRecord>,
    cells: CellMap,
    change_log: Vec<ChangeLogEntry>,
    collapsed: BTreeSet<Category>,
    dirty: bool,
}

impl TrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Persistence: four independent blobs
    // ------------------------------------------------------------------

    /// Load state from the database.  A blob that was never written
    /// yields its empty default.
    pub fn load(db: &Database) -> Result<Self> {
        Ok(Self {
            tasks: db.load_blob(BLOB_TASKS)?.unwrap_or_default(),
            cells: db.load_blob(BLOB_CELL_DATA)?.unwrap_or_default(),
            change_log: db.load_blob(BLOB_CHANGE_LOG)?.unwrap_or_default(),
            collapsed: db.load_blob(BLOB_COLLAPSED)?.unwrap_or_default(),
            dirty: false,
        })
    }

    /// Save every blob.  Each write replaces a single row; one failing
    /// save leaves the other blobs untouched.
    pub fn persist(&self, db: &Database) -> Result<()> {
        db.save_blob(BLOB_TASKS, &self.tasks)?;
        db.save_blob(BLOB_CELL_DATA, &self.cells)?;
        db.save_blob(BLOB_CHANGE_LOG, &self.change_log)?;
        db.save_blob(BLOB_COLLAPSED, &self.collapsed)?;
        Ok(())
    }

    /// Full local data reset: wipes memory and every persisted blob.
    /// This is the only operation that may discard the change log.
    pub fn reset(&mut self, db: &Database) -> Result<()> {
        db.clear_blobs()?;
        *self = Self::default();
        tracing::info!("local tracker data reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn tasks_in_category(&self, category: Category) -> impl Iterator<Item = &TaskRecord> + '_ {
        self.tasks.iter().filter(move |t| t.category == category)
    }

    pub fn cells(&self) -> &CellMap {
        &self.cells
    }

    pub fn change_log(&self) -> &[ChangeLogEntry] {
        &self.change_log
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Lower the dirty flag.  Called by the sync engine after the local
    /// state has been successfully pushed.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn is_collapsed(&self, category: Category) -> bool {
        self.collapsed.contains(&category)
    }

    /// Collapse or expand a category header.  UI-only state: not shared,
    /// not audited, but persisted in its own blob.
    pub fn toggle_collapsed(&mut self, category: Category) {
        if !self.collapsed.remove(&category) {
            self.collapsed.insert(category);
        }
    }

    fn task(&self, id: u64) -> Result<&TaskRecord> {
        self.tasks
            .iter()
            .find(|t| t.id == id)
            .ok_or(StoreError::TaskNotFound(id))
    }

    fn task_mut(&mut self, id: u64) -> Result<&mut TaskRecord> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::TaskNotFound(id))
    }

    // ------------------------------------------------------------------
    // Task operations
    // ------------------------------------------------------------------

    /// Create a task.  Ids are allocated monotonically above the highest
    /// id currently present.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        category: Category,
        priority: Priority,
        actor: &Identity,
    ) -> u64 {
        let name = name.into();
        let id = self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        self.tasks.push(TaskRecord {
            id,
            name: name.clone(),
            category,
            priority,
            delivery_date: None,
        });
        self.log(
            actor,
            ChangeAction::TaskCreated,
            format!("Created new task: {} in {}", name, category.label()),
            Some(id),
            None,
        );
        id
    }

    pub fn rename_task(&mut self, id: u64, name: impl Into<String>, actor: &Identity) -> Result<()> {
        let name = name.into();
        let task = self.task_mut(id)?;
        let old = std::mem::replace(&mut task.name, name.clone());
        if old != name {
            self.log(
                actor,
                ChangeAction::TaskEdited,
                format!("Changed task name from \"{old}\" to \"{name}\""),
                Some(id),
                None,
            );
        }
        Ok(())
    }

    pub fn set_priority(&mut self, id: u64, priority: Priority, actor: &Identity) -> Result<()> {
        let task = self.task_mut(id)?;
        if task.priority != priority {
            task.priority = priority;
            let name = task.name.clone();
            self.log(
                actor,
                ChangeAction::TaskEdited,
                format!("Changed priority of {name} to {priority}"),
                Some(id),
                None,
            );
        }
        Ok(())
    }

    pub fn set_delivery_date(
        &mut self,
        id: u64,
        date: Option<NaiveDate>,
        actor: &Identity,
    ) -> Result<()> {
        let task = self.task_mut(id)?;
        if task.delivery_date != date {
            task.delivery_date = date;
            let name = task.name.clone();
            let details = match date {
                Some(d) => format!("Set delivery date of {name} to {d}"),
                None => format!("Removed delivery date of {name}"),
            };
            self.log(actor, ChangeAction::TaskEdited, details, Some(id), None);
        }
        Ok(())
    }

    /// Move a task to a new position in the list (drag-and-drop reorder).
    pub fn move_task(&mut self, id: u64, to_index: usize) -> Result<()> {
        let from = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::TaskNotFound(id))?;
        let task = self.tasks.remove(from);
        let to_index = to_index.min(self.tasks.len());
        self.tasks.insert(to_index, task);
        self.dirty = true;
        Ok(())
    }

    /// Delete a task and every cell assignment keyed by its id.
    pub fn delete_task(&mut self, id: u64, actor: &Identity) -> Result<()> {
        let name = self.task(id)?.name.clone();
        self.tasks.retain(|t| t.id != id);
        self.cells.retain(|key, _| key.task_id != id);
        self.log(
            actor,
            ChangeAction::TaskDeleted,
            format!("Deleted task: {name}"),
            Some(id),
            None,
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cell operations
    // ------------------------------------------------------------------

    /// Current value of a cell, defaulting to empty for untouched cells.
    pub fn cell(&self, task_id: u64, week: u32) -> CellAssignment {
        self.cells
            .get(&CellKey::new(task_id, week))
            .cloned()
            .unwrap_or_default()
    }

    /// A cell is scheduled iff it has an assignee or a status.
    pub fn is_cell_scheduled(&self, task_id: u64, week: u32) -> bool {
        self.cell(task_id, week).is_scheduled()
    }

    /// Weeks in which a task has at least one scheduled cell.
    pub fn scheduled_weeks(&self, task_id: u64) -> Vec<u32> {
        self.cells
            .iter()
            .filter(|(key, cell)| key.task_id == task_id && cell.is_scheduled())
            .map(|(key, _)| key.week)
            .collect()
    }

    /// First interaction with an unscheduled cell: mark it planned.
    /// Non-admin actors are also auto-assigned to cells they touch.
    pub fn schedule_cell(&mut self, task_id: u64, week: u32, actor: &Identity) -> Result<()> {
        self.task(task_id)?;
        if self.is_cell_scheduled(task_id, week) {
            return Ok(());
        }
        self.set_status(task_id, week, Some(CellStatus::Planned), actor)?;
        if !actor.is_admin {
            self.set_assignee(task_id, week, Some(actor.display_name.clone()), actor)?;
        }
        Ok(())
    }

    /// Schedule every not-yet-scheduled cell of one task across a week
    /// range (inclusive).
    pub fn schedule_range(
        &mut self,
        task_id: u64,
        weeks: std::ops::RangeInclusive<u32>,
        actor: &Identity,
    ) -> Result<()> {
        for week in weeks {
            self.schedule_cell(task_id, week, actor)?;
        }
        Ok(())
    }

    pub fn set_assignee(
        &mut self,
        task_id: u64,
        week: u32,
        assignee: Option<String>,
        actor: &Identity,
    ) -> Result<()> {
        let task_name = self.task(task_id)?.name.clone();
        let key = CellKey::new(task_id, week);
        let cell = self.cells.entry(key).or_default();
        if cell.assignee == assignee {
            return Ok(());
        }
        cell.assignee = assignee.clone();

        let details = match assignee {
            Some(name) => format!("Assigned {task_name} to {name} for W{}", week + 1),
            None => format!("Assigned {task_name} to unassigned for W{}", week + 1),
        };
        self.log(actor, ChangeAction::Assignment, details, Some(task_id), Some(week));
        Ok(())
    }

    pub fn set_status(
        &mut self,
        task_id: u64,
        week: u32,
        status: Option<CellStatus>,
        actor: &Identity,
    ) -> Result<()> {
        let task_name = self.task(task_id)?.name.clone();
        let key = CellKey::new(task_id, week);
        let cell = self.cells.entry(key).or_default();
        if cell.status == status {
            return Ok(());
        }
        cell.status = status;

        if let Some(status) = status {
            self.log(
                actor,
                ChangeAction::StatusChange,
                format!("Changed status of {task_name} to {status} for W{}", week + 1),
                Some(task_id),
                Some(week),
            );
        }
        Ok(())
    }

    /// Clear a cell entirely: both fields go, the record is removed.
    pub fn clear_cell(&mut self, task_id: u64, week: u32, actor: &Identity) -> Result<()> {
        let task_name = self.task(task_id)?.name.clone();
        if self.cells.remove(&CellKey::new(task_id, week)).is_some() {
            self.log(
                actor,
                ChangeAction::CellCleared,
                format!("Cleared W{} for {task_name}", week + 1),
                Some(task_id),
                Some(week),
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit log
    // ------------------------------------------------------------------

    pub fn record_login(&mut self, actor: &Identity) {
        self.log(
            actor,
            ChangeAction::Login,
            format!("User {} logged in", actor.display_name),
            None,
            None,
        );
    }

    pub fn record_logout(&mut self, actor: &Identity) {
        self.log(
            actor,
            ChangeAction::Logout,
            format!("User {} logged out", actor.display_name),
            None,
            None,
        );
    }

    fn log(
        &mut self,
        actor: &Identity,
        action: ChangeAction,
        details: String,
        task_id: Option<u64>,
        week: Option<u32>,
    ) {
        self.change_log
            .push(ChangeLogEntry::new(actor, action, details, task_id, week));
        self.dirty = true;
    }

    // ------------------------------------------------------------------
    // Snapshot exchange
    // ------------------------------------------------------------------

    /// Build the shared snapshot from current state, stamped with the
    /// committing identity and the current time.
    pub fn to_snapshot(&self, committed_by: &Identity) -> SharedSnapshot {
        SharedSnapshot {
            tasks: self.tasks.clone(),
            cell_data: self.cells.clone(),
            change_log: self.change_log.clone(),
            last_updated: Utc::now(),
            committed_by: committed_by.clone(),
        }
    }

    /// Replace tasks, cells, and change log wholesale with a merged
    /// result.  The collapsed-category state and dirty flag are local
    /// concerns and are left untouched.
    pub fn apply_merged(
        &mut self,
        tasks: Vec<TaskRecord>,
        cells: CellMap,
        change_log: Vec<ChangeLogEntry>,
    ) {
        self.tasks = tasks;
        self.cells = cells;
        self.change_log = change_log;
    }
}
