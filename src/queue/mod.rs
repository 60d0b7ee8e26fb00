//! The local edit queue.
//!
//! An [`EditQueue`] owns one script-editing session: the server baseline, the
//! operation log with its undo cursor, and the checkpoints taken along the
//! way. The current script is never stored; every read folds the baseline
//! with the applied prefix of the log, so undo and redo only move the cursor.

/// Named restore points
pub mod checkpoint;
/// Applying operations to a script
pub mod fold;
/// The operation log entry types
pub mod operation;

pub use checkpoint::{CheckpointType, EditCheckpoint, ElementSnapshot};
pub use operation::{CollapseChange, EditChange, EditOperation, ParentChange, SequenceChange};

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::script::{display, ScriptElement, ScriptState};
use crate::types::{CheckpointId, ElementId, OperationId};

/// The serializable part of a session: log, cursor and checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditQueueState {
    /// Recorded operations, including an undone tail available for redo.
    pub operations: Vec<EditOperation>,
    /// Number of operations currently applied.
    pub current_index: usize,
    /// Checkpoints in creation order.
    pub checkpoints: Vec<EditCheckpoint>,
    /// Most recent checkpoint eligible for a one-step revert.
    pub active_checkpoint: Option<CheckpointId>,
}

/// One row of the history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Log position; reverting to `index` keeps operations before it.
    pub index: usize,
    /// Operation id.
    pub id: OperationId,
    /// Wire name of the operation type.
    pub kind: &'static str,
    /// Human-readable summary.
    pub description: String,
    /// When the edit was made.
    pub timestamp: DateTime<Utc>,
    /// Whether the operation is currently applied (not undone).
    pub applied: bool,
}

/// Everything needed to persist the applied edits in one request.
#[derive(Debug, Clone)]
pub struct SaveBatch {
    /// The folded script at the time the batch was taken.
    pub state: ScriptState,
    /// The applied operations, for the server's audit trail.
    pub operations: Vec<EditOperation>,
}

/// Client-side edit queue for one script.
#[derive(Debug, Clone)]
pub struct EditQueue {
    server: ScriptState,
    state: EditQueueState,
    in_flight: Option<HashSet<OperationId>>,
}

impl EditQueue {
    /// Opens a session on a server baseline with an empty log.
    pub fn new(server: ScriptState) -> Self {
        Self::from_parts(server, EditQueueState::default())
    }

    /// Resumes a session from a saved log.
    ///
    /// A cursor past the end of the log is clamped.
    pub fn from_parts(mut server: ScriptState, mut state: EditQueueState) -> Self {
        server.normalize();
        if state.current_index > state.operations.len() {
            tracing::warn!(
                current_index = state.current_index,
                operations = state.operations.len(),
                "Clamping undo cursor to the end of the log"
            );
            state.current_index = state.operations.len();
        }
        Self { server, state, in_flight: None }
    }

    // ---- Derived view ----

    /// The script with every applied operation folded in.
    pub fn current_state(&self) -> ScriptState {
        fold::fold_lenient(&self.server, self.pending_operations()).0
    }

    /// The displayed list: time-sorted under auto-sort, collapsed children
    /// removed.
    pub fn elements(&self) -> Vec<ScriptElement> {
        self.current_state().displayed()
    }

    /// Every element in sequence order, collapsed children included.
    pub fn all_elements(&self) -> Vec<ScriptElement> {
        self.current_state().elements
    }

    /// Looks up one element in the current script.
    pub fn element(&self, id: &ElementId) -> Option<ScriptElement> {
        self.current_state().get(id).cloned()
    }

    /// The server baseline.
    pub const fn server_state(&self) -> &ScriptState {
        &self.server
    }

    /// The serializable log, cursor and checkpoints.
    pub const fn state(&self) -> &EditQueueState {
        &self.state
    }

    /// Whether any applied operation has not been saved.
    pub const fn has_unsaved_changes(&self) -> bool {
        self.state.current_index > 0
    }

    /// The applied operations, oldest first.
    pub fn pending_operations(&self) -> &[EditOperation] {
        &self.state.operations[..self.state.current_index]
    }

    /// Every recorded operation, undone tail included.
    pub fn operations(&self) -> &[EditOperation] {
        &self.state.operations
    }

    /// Number of applied operations.
    pub const fn current_index(&self) -> usize {
        self.state.current_index
    }

    /// Checkpoints in creation order.
    pub fn checkpoints(&self) -> &[EditCheckpoint] {
        &self.state.checkpoints
    }

    /// The checkpoint eligible for a one-step revert.
    pub const fn active_checkpoint(&self) -> Option<&CheckpointId> {
        self.state.active_checkpoint.as_ref()
    }

    /// The history list, one entry per recorded operation.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state
            .operations
            .iter()
            .enumerate()
            .map(|(index, op)| HistoryEntry {
                index,
                id: op.id.clone(),
                kind: op.kind(),
                description: op.description.clone(),
                timestamp: op.timestamp,
                applied: index < self.state.current_index,
            })
            .collect()
    }

    // ---- Recording ----

    /// Records an operation at the cursor, discarding any redo tail.
    ///
    /// The operation is checked against the current script first; if it
    /// does not apply, nothing is recorded and the error is returned.
    pub fn apply_local_change(&mut self, op: EditOperation) -> Result<()> {
        self.apply_local_changes(vec![op])
    }

    /// Records several operations, all or nothing.
    pub fn apply_local_changes(&mut self, ops: Vec<EditOperation>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut probe = self.current_state();
        for op in &ops {
            fold::apply_operation(&mut probe, op)?;
        }

        let cursor = self.state.current_index;
        if cursor < self.state.operations.len() {
            let discarded = self.state.operations.len() - cursor;
            tracing::debug!(discarded, "Discarding redo tail");
            self.state.operations.truncate(cursor);
            self.drop_checkpoints_after(cursor);
        }
        for op in ops {
            tracing::debug!(operation = %op.id, kind = op.kind(), "{}", op.description);
            self.state.operations.push(op);
        }
        self.state.current_index = self.state.operations.len();
        Ok(())
    }

    /// Checkpoints are chained, so the first stale one and all later ones go.
    fn drop_checkpoints_after(&mut self, index: usize) {
        let Some(first_stale) =
            self.state.checkpoints.iter().position(|c| c.operation_index > index)
        else {
            return;
        };
        let dropped = self.state.checkpoints.split_off(first_stale);
        tracing::debug!(dropped = dropped.len(), "Dropping checkpoints past the log end");
        self.clear_active_if_missing();
    }

    fn clear_active_if_missing(&mut self) {
        let still_there = self
            .state
            .active_checkpoint
            .as_ref()
            .is_some_and(|id| self.state.checkpoints.iter().any(|c| &c.id == id));
        if !still_there {
            self.state.active_checkpoint = None;
        }
    }

    // ---- Undo / redo ----

    /// Whether there is an applied operation to undo.
    pub const fn can_undo(&self) -> bool {
        self.state.current_index > 0
    }

    /// Whether there is an undone operation to redo.
    pub fn can_redo(&self) -> bool {
        self.state.current_index < self.state.operations.len()
    }

    /// Steps the cursor back one operation; returns whether it moved.
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.state.current_index -= 1;
        let op = &self.state.operations[self.state.current_index];
        tracing::debug!(
            description = %op.description,
            undo_depth = self.state.current_index,
            redo_depth = self.state.operations.len() - self.state.current_index,
            "Undo"
        );
        true
    }

    /// Steps the cursor forward one operation; returns whether it moved.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        let op = &self.state.operations[self.state.current_index];
        tracing::debug!(
            description = %op.description,
            undo_depth = self.state.current_index + 1,
            "Redo"
        );
        self.state.current_index += 1;
        true
    }

    /// Truncates the log to its first `index` operations.
    ///
    /// Checkpoints are left alone; any recorded past the new end stop being
    /// restorable until they are dropped by the next recorded operation.
    pub fn revert_to_point(&mut self, index: usize) -> Result<()> {
        if index > self.state.operations.len() {
            return Err(Error::invalid(
                "revert to point",
                format!("index {index} beyond {} operations", self.state.operations.len()),
            ));
        }
        self.state.operations.truncate(index);
        self.state.current_index = index;
        tracing::info!(index, "Reverted history to point");
        Ok(())
    }

    // ---- Checkpoints ----

    /// Snapshots the current script and makes it the active checkpoint.
    pub fn create_checkpoint(
        &mut self,
        checkpoint_type: CheckpointType,
        description: impl Into<String>,
    ) -> CheckpointId {
        let previous = checkpoint::materialize(&self.server, &self.state.checkpoints);
        let since = self
            .state
            .checkpoints
            .last()
            .map_or(0, |c| c.operation_index)
            .min(self.state.current_index);
        let cp = EditCheckpoint::capture(
            checkpoint_type,
            description,
            &previous,
            &self.current_state(),
            self.state.operations[since..self.state.current_index].to_vec(),
            self.state.current_index,
        );
        let id = cp.id.clone();
        tracing::info!(
            checkpoint = %id,
            changed = cp.element_snapshots.len(),
            operation_index = cp.operation_index,
            "Created checkpoint: {}",
            cp.description
        );
        self.state.checkpoints.push(cp);
        self.state.active_checkpoint = Some(id.clone());
        id
    }

    /// Restores the script to a checkpoint and drops everything after it.
    ///
    /// The checkpoint chain is replayed onto the baseline and its element
    /// count compared with the recorded count; on mismatch nothing changes.
    ///
    /// The restored script is always the log folded up to the checkpoint's
    /// position, since the view is derived from the log. The snapshot fields
    /// only serve the count check and a warning when they disagree with it.
    pub fn revert_to_checkpoint(&mut self, id: &CheckpointId) -> Result<()> {
        let pos = self
            .state
            .checkpoints
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| Error::CheckpointNotFound(id.clone()))?;
        let cp = &self.state.checkpoints[pos];

        let restored = checkpoint::materialize(&self.server, &self.state.checkpoints[..=pos]);
        if restored.len() != cp.total_element_count {
            return Err(Error::CheckpointMismatch {
                checkpoint: id.clone(),
                expected: cp.total_element_count,
                actual: restored.len(),
            });
        }
        let target = cp.operation_index;
        if target > self.state.operations.len() {
            return Err(Error::invalid(
                "revert to checkpoint",
                format!("checkpoint {id} was taken past the end of the log"),
            ));
        }

        let (from_log, _) = fold::fold_lenient(&self.server, &self.state.operations[..target]);
        if from_log.elements != restored.elements || from_log.info != restored.info {
            tracing::warn!(
                checkpoint = %id,
                "Checkpoint snapshot differs from its log position; restoring from the log"
            );
        }

        self.state.operations.truncate(target);
        self.state.current_index = target;
        self.state.checkpoints.truncate(pos + 1);
        if self.state.active_checkpoint.as_ref() == Some(id) {
            self.state.active_checkpoint = None;
        }
        self.clear_active_if_missing();
        tracing::info!(checkpoint = %id, operation_index = target, "Reverted to checkpoint");
        Ok(())
    }

    // ---- Convenience edits ----

    /// Flips one group's collapsed flag.
    pub fn toggle_group_collapse(&mut self, group_id: &ElementId) -> Result<()> {
        let state = self.current_state();
        let group = state.get(group_id).ok_or_else(|| Error::ElementNotFound(group_id.clone()))?;
        let collapsed = !group.is_collapsed;
        let verb = if collapsed { "Collapse" } else { "Expand" };
        let description = format!("{verb} {}", operation::label(group));
        self.apply_local_change(EditOperation::new(
            description,
            EditChange::ToggleGroupCollapse { group_id: group_id.clone(), collapsed },
        ))
    }

    /// Expands every collapsed group; returns whether anything changed.
    pub fn expand_all_groups(&mut self) -> Result<bool> {
        self.set_all_collapsed(false)
    }

    /// Collapses every expanded group; returns whether anything changed.
    pub fn collapse_all_groups(&mut self) -> Result<bool> {
        self.set_all_collapsed(true)
    }

    fn set_all_collapsed(&mut self, collapsed: bool) -> Result<bool> {
        let changes: Vec<CollapseChange> = self
            .current_state()
            .groups()
            .filter(|g| g.is_collapsed != collapsed)
            .map(|g| CollapseChange {
                group_id: g.element_id.clone(),
                old_collapsed: g.is_collapsed,
                new_collapsed: collapsed,
            })
            .collect();
        if changes.is_empty() {
            return Ok(false);
        }
        let description = if collapsed { "Collapse all groups" } else { "Expand all groups" };
        self.apply_local_change(EditOperation::new(
            description,
            EditChange::BatchCollapseGroups { changes },
        ))?;
        Ok(true)
    }

    /// Turns auto-sort on, resequencing into time order.
    ///
    /// An `AUTO_SORT` checkpoint is taken first so the manual order can be
    /// restored. Returns `false` when auto-sort was already on.
    pub fn enable_auto_sort(&mut self) -> Result<bool> {
        let state = self.current_state();
        if state.auto_sort {
            return Ok(false);
        }
        let resequenced: Vec<SequenceChange> = display::time_ordered(&state.elements)
            .iter()
            .zip(1u32..)
            .filter(|(e, seq)| e.sequence != *seq)
            .map(|(e, seq)| SequenceChange {
                element_id: e.element_id.clone(),
                old_sequence: e.sequence,
                new_sequence: seq,
            })
            .collect();

        self.create_checkpoint(CheckpointType::AutoSort, "Before auto-sort");
        self.apply_local_change(EditOperation::new(
            "Enable auto-sort",
            EditChange::EnableAutoSort { resequenced },
        ))?;
        Ok(true)
    }

    /// Turns auto-sort off; returns `false` when it was already off.
    pub fn disable_auto_sort(&mut self) -> Result<bool> {
        if !self.current_state().auto_sort {
            return Ok(false);
        }
        self.apply_local_change(EditOperation::new(
            "Disable auto-sort",
            EditChange::DisableAutoSort { resequenced: Vec::new() },
        ))?;
        Ok(true)
    }

    // ---- Baseline and saving ----

    /// Replaces the server element list, keeping every pending operation.
    ///
    /// Checkpoints are re-captured against the new baseline so they stay
    /// restorable.
    pub fn update_server_elements(&mut self, elements: Vec<ScriptElement>) {
        self.server.elements = elements;
        self.server.normalize();
        self.rebase_checkpoints();
        let (_, skipped) = fold::fold_lenient(&self.server, self.pending_operations());
        tracing::info!(
            elements = self.server.len(),
            pending = self.state.current_index,
            skipped = skipped.len(),
            "Server baseline refreshed"
        );
    }

    fn rebase_checkpoints(&mut self) {
        let mut previous = self.server.clone();
        for cp in &mut self.state.checkpoints {
            let index = cp.operation_index.min(self.state.operations.len());
            let (current, _) = fold::fold_lenient(&self.server, &self.state.operations[..index]);
            cp.rebase(&previous, &current);
            previous = current;
        }
    }

    /// Drops every local edit and checkpoint.
    pub fn discard_changes(&mut self) {
        tracing::info!(discarded = self.state.operations.len(), "Discarding local changes");
        self.state = EditQueueState::default();
    }

    /// Whether a save is waiting for the server.
    pub const fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Takes the applied operations for saving.
    ///
    /// Returns `Ok(None)` when nothing is pending and
    /// [`Error::SaveInProgress`] when a save is already waiting.
    pub fn prepare_save(&mut self) -> Result<Option<SaveBatch>> {
        if self.in_flight.is_some() {
            return Err(Error::SaveInProgress);
        }
        if !self.has_unsaved_changes() {
            return Ok(None);
        }
        let operations = self.pending_operations().to_vec();
        self.in_flight = Some(operations.iter().map(|op| op.id.clone()).collect());
        Ok(Some(SaveBatch { state: self.current_state(), operations }))
    }

    /// Adopts the server's canonical list after a successful save.
    ///
    /// Saved operations leave the log; operations recorded while the save
    /// was running stay pending on top of the new baseline.
    pub fn complete_save(&mut self, batch: &SaveBatch, saved: Vec<ScriptElement>) {
        let saved_ids: HashSet<&OperationId> = batch.operations.iter().map(|op| &op.id).collect();
        let cursor = self.state.current_index;
        let mut retained = Vec::new();
        let mut new_index = 0;
        for (index, op) in std::mem::take(&mut self.state.operations).into_iter().enumerate() {
            if saved_ids.contains(&op.id) {
                if index >= cursor {
                    tracing::warn!(
                        operation = %op.id,
                        "Operation was undone after it was sent; the server kept it"
                    );
                }
                continue;
            }
            if index < cursor {
                new_index += 1;
            }
            retained.push(op);
        }

        self.server = ScriptState::new(batch.state.info.clone(), batch.state.auto_sort, saved);
        self.state = EditQueueState {
            operations: retained,
            current_index: new_index,
            checkpoints: Vec::new(),
            active_checkpoint: None,
        };
        self.in_flight = None;
        tracing::info!(
            saved = batch.operations.len(),
            still_pending = self.state.current_index,
            "Save complete"
        );
    }

    /// Releases the in-flight guard after a failed save; local state is
    /// untouched.
    pub fn abort_save(&mut self) {
        self.in_flight = None;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::script::{FieldChange, ScriptInfo};

    fn queue(elements: Vec<ScriptElement>) -> EditQueue {
        let elements = elements
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.with_sequence(u32::try_from(i + 1).unwrap()))
            .collect();
        EditQueue::new(ScriptState::new(ScriptInfo::new("Test"), false, elements))
    }

    fn ids(elements: &[ScriptElement]) -> Vec<&str> {
        elements.iter().map(|e| e.element_id.as_str()).collect()
    }

    fn retime(q: &EditQueue, id: &str, offset_ms: i64) -> EditOperation {
        let before = q.element(&ElementId::new(id)).unwrap();
        let mut after = before.clone();
        after.offset_ms = offset_ms;
        EditOperation::update_element(&before, &after).unwrap()
    }

    fn abc() -> EditQueue {
        queue(vec![
            ScriptElement::cue("a", 0),
            ScriptElement::cue("b", 1000),
            ScriptElement::cue("c", 2000),
        ])
    }

    #[test]
    fn undo_then_redo_restores_every_prefix() {
        let mut q = abc();
        let c = q.element(&ElementId::new("c")).unwrap();
        q.apply_local_change(EditOperation::reorder(&c, 1).unwrap()).unwrap();
        q.apply_local_change(retime(&q, "a", 500)).unwrap();
        q.apply_local_change(EditOperation::delete_element(
            &q.element(&ElementId::new("b")).unwrap(),
        ))
        .unwrap();

        let snapshots: Vec<ScriptState> = (0..=3)
            .map(|k| fold::fold(q.server_state(), &q.operations()[..k]).unwrap())
            .collect();
        assert_eq!(q.current_state(), snapshots[3]);

        for k in (0..3).rev() {
            assert!(q.undo());
            assert_eq!(q.current_state(), snapshots[k]);
        }
        assert!(!q.undo());
        for snapshot in snapshots.iter().skip(1) {
            assert!(q.redo());
            assert_eq!(&q.current_state(), snapshot);
        }
        assert!(!q.can_redo());
    }

    #[test]
    fn new_change_after_undo_discards_redo_tail() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        q.apply_local_change(retime(&q, "b", 1100)).unwrap();
        q.undo();
        q.apply_local_change(retime(&q, "c", 2100)).unwrap();

        assert_eq!(q.operations().len(), 2);
        assert_eq!(q.current_index(), 2);
        assert!(!q.can_redo());
        assert_eq!(q.element(&ElementId::new("b")).unwrap().offset_ms, 1000);
    }

    #[test]
    fn rejected_change_is_not_recorded() {
        let mut q = abc();
        let ghost = ScriptElement::cue("ghost", 0);
        let err = q.apply_local_change(EditOperation::delete_element(&ghost)).unwrap_err();
        assert!(matches!(err, Error::ElementNotFound(_)));
        assert!(q.operations().is_empty());
        assert!(!q.has_unsaved_changes());
    }

    #[test]
    fn batch_of_changes_is_all_or_nothing() {
        let mut q = abc();
        let good = retime(&q, "a", 100);
        let bad = EditOperation::delete_element(&ScriptElement::cue("ghost", 0));
        assert!(q.apply_local_changes(vec![good, bad]).is_err());
        assert!(q.operations().is_empty());
    }

    #[test]
    fn checkpoint_revert_restores_and_truncates() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        let cp = q.create_checkpoint(CheckpointType::Manual, "Before cuts");
        let at_checkpoint = q.all_elements();
        assert_eq!(q.active_checkpoint(), Some(&cp));

        q.apply_local_change(EditOperation::delete_element(
            &q.element(&ElementId::new("b")).unwrap(),
        ))
        .unwrap();
        q.apply_local_change(retime(&q, "c", 9000)).unwrap();

        q.revert_to_checkpoint(&cp).unwrap();
        assert_eq!(q.all_elements(), at_checkpoint);
        assert_eq!(q.operations().len(), 1);
        assert_eq!(q.active_checkpoint(), None);
    }

    #[test]
    fn checkpoint_revert_is_idempotent() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "b", 1500)).unwrap();
        let first = q.create_checkpoint(CheckpointType::Manual, "one");
        q.apply_local_change(EditOperation::create_element(ScriptElement::note("n", 50), Some(1)))
            .unwrap();

        q.revert_to_checkpoint(&first).unwrap();
        let reverted = q.all_elements();
        let second = q.create_checkpoint(CheckpointType::Manual, "two");
        q.revert_to_checkpoint(&second).unwrap();
        assert_eq!(q.all_elements(), reverted);
    }

    #[test]
    fn stale_checkpoint_is_rejected_without_changes() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        let cp = q.create_checkpoint(CheckpointType::Manual, "cp");
        q.apply_local_change(retime(&q, "b", 1100)).unwrap();
        q.state.checkpoints[0].total_element_count = 99;

        let before = q.state().clone();
        let err = q.revert_to_checkpoint(&cp).unwrap_err();
        assert!(matches!(err, Error::CheckpointMismatch { expected: 99, actual: 3, .. }));
        assert_eq!(q.state(), &before);
    }

    #[test]
    fn unknown_checkpoint_is_an_error() {
        let mut q = abc();
        let err = q.revert_to_checkpoint(&CheckpointId::new("nope")).unwrap_err();
        assert!(matches!(err, Error::CheckpointNotFound(_)));
    }

    #[test]
    fn branching_drops_later_checkpoints() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        q.apply_local_change(retime(&q, "a", 200)).unwrap();
        q.create_checkpoint(CheckpointType::Manual, "late");
        q.undo();
        q.apply_local_change(retime(&q, "c", 2500)).unwrap();
        assert!(q.checkpoints().is_empty());
        assert_eq!(q.active_checkpoint(), None);
    }

    #[test]
    fn revert_to_point_truncates_log() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        q.apply_local_change(retime(&q, "b", 1100)).unwrap();
        q.apply_local_change(retime(&q, "c", 2100)).unwrap();

        q.revert_to_point(1).unwrap();
        assert_eq!(q.operations().len(), 1);
        assert_eq!(q.current_index(), 1);
        assert_eq!(q.element(&ElementId::new("b")).unwrap().offset_ms, 1000);
        assert!(q.revert_to_point(5).is_err());
    }

    #[test]
    fn enable_auto_sort_checkpoints_and_resequences() {
        let mut q = queue(vec![
            ScriptElement::cue("late", 3000),
            ScriptElement::cue("early", 0),
            ScriptElement::cue("mid", 1500),
        ]);
        assert!(q.enable_auto_sort().unwrap());
        assert!(!q.enable_auto_sort().unwrap());
        assert_eq!(q.checkpoints().len(), 1);
        assert_eq!(q.checkpoints()[0].checkpoint_type, CheckpointType::AutoSort);
        assert_eq!(ids(&q.all_elements()), vec!["early", "mid", "late"]);

        let cp = q.checkpoints()[0].id.clone();
        q.revert_to_checkpoint(&cp).unwrap();
        assert!(!q.current_state().auto_sort);
        assert_eq!(ids(&q.all_elements()), vec!["late", "early", "mid"]);
    }

    #[test]
    fn displayed_list_hides_collapsed_children() {
        let mut q = queue(vec![
            ScriptElement::group("g", 0),
            ScriptElement::cue("c1", 100).with_parent("g", 1),
            ScriptElement::cue("c2", 200),
        ]);
        q.toggle_group_collapse(&ElementId::new("g")).unwrap();
        assert_eq!(ids(&q.elements()), vec!["g", "c2"]);
        assert_eq!(q.all_elements().len(), 3);

        assert!(!q.collapse_all_groups().unwrap());
        assert!(q.expand_all_groups().unwrap());
        assert_eq!(ids(&q.elements()), vec!["g", "c1", "c2"]);
        assert_eq!(q.operations().len(), 2);
    }

    #[test]
    fn successful_save_clears_the_log() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        q.create_checkpoint(CheckpointType::Manual, "cp");

        let batch = q.prepare_save().unwrap().unwrap();
        assert!(matches!(q.prepare_save(), Err(Error::SaveInProgress)));
        let saved = batch.state.elements.clone();
        q.complete_save(&batch, saved);

        assert!(q.operations().is_empty());
        assert_eq!(q.current_index(), 0);
        assert!(q.checkpoints().is_empty());
        assert_eq!(q.server_state().elements[0].offset_ms, 100);
        assert!(q.prepare_save().unwrap().is_none());
    }

    #[test]
    fn edits_made_during_a_save_stay_pending() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        let batch = q.prepare_save().unwrap().unwrap();
        q.apply_local_change(retime(&q, "b", 1100)).unwrap();

        let saved = batch.state.elements.clone();
        q.complete_save(&batch, saved);
        assert_eq!(q.operations().len(), 1);
        assert_eq!(q.current_index(), 1);
        assert_eq!(q.element(&ElementId::new("a")).unwrap().offset_ms, 100);
        assert_eq!(q.element(&ElementId::new("b")).unwrap().offset_ms, 1100);
    }

    #[test]
    fn failed_save_leaves_state_unchanged() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        let before = q.state().clone();
        let _batch = q.prepare_save().unwrap().unwrap();
        q.abort_save();
        assert_eq!(q.state(), &before);
        assert!(!q.is_saving());
    }

    #[test]
    fn baseline_refresh_keeps_pending_edits() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        let mut refreshed = q.server_state().elements.clone();
        refreshed[2].element_name = "Blackout".into();
        q.update_server_elements(refreshed);

        assert_eq!(q.operations().len(), 1);
        assert_eq!(q.element(&ElementId::new("a")).unwrap().offset_ms, 100);
        assert_eq!(q.element(&ElementId::new("c")).unwrap().element_name, "Blackout");
    }

    #[test]
    fn baseline_refresh_skips_ops_that_no_longer_apply() {
        let mut q = abc();
        q.apply_local_change(EditOperation::new(
            "retime c",
            EditChange::UpdateElement {
                element_id: ElementId::new("c"),
                changes: vec![FieldChange::OffsetMs { old: 2000, new: 2500 }],
            },
        ))
        .unwrap();
        let without_c = q.server_state().elements[..2].to_vec();
        q.update_server_elements(without_c);
        assert_eq!(ids(&q.all_elements()), vec!["a", "b"]);
        assert!(q.has_unsaved_changes());
    }

    #[test]
    fn checkpoints_survive_a_baseline_refresh() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        let cp = q.create_checkpoint(CheckpointType::Manual, "retimed");
        q.apply_local_change(retime(&q, "b", 1200)).unwrap();

        let mut refreshed = q.server_state().elements.clone();
        refreshed.push(ScriptElement::note("d", 3000).with_sequence(4));
        q.update_server_elements(refreshed);
        assert_eq!(q.checkpoints()[0].total_element_count, 4);

        q.revert_to_checkpoint(&cp).unwrap();
        assert_eq!(q.operations().len(), 1);
        assert_eq!(ids(&q.all_elements()), vec!["a", "b", "c", "d"]);
        assert_eq!(q.element(&ElementId::new("a")).unwrap().offset_ms, 100);
        assert_eq!(q.element(&ElementId::new("b")).unwrap().offset_ms, 1000);
    }

    #[test]
    fn history_marks_undone_entries() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        q.apply_local_change(retime(&q, "b", 1100)).unwrap();
        q.undo();
        let history = q.history();
        assert_eq!(history.len(), 2);
        assert!(history[0].applied);
        assert!(!history[1].applied);
        assert_eq!(history[1].kind, "UPDATE_ELEMENT");
    }

    #[test]
    fn discard_resets_everything_local() {
        let mut q = abc();
        q.apply_local_change(retime(&q, "a", 100)).unwrap();
        q.create_checkpoint(CheckpointType::Manual, "cp");
        q.discard_changes();
        assert_eq!(q.state(), &EditQueueState::default());
        assert_eq!(q.element(&ElementId::new("a")).unwrap().offset_ms, 0);
    }
}
