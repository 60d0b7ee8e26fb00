//! Folding operations onto a baseline script.
//!
//! The current script is never stored: it is always the server baseline with
//! a prefix of the operation log folded in order. Each fold step is atomic:
//! an operation that does not apply leaves the script exactly as it was.

use std::collections::HashSet;

use super::operation::{EditChange, EditOperation, ParentChange, SequenceChange};
use crate::error::{Error, Result};
use crate::script::{ScriptElement, ScriptState};
use crate::types::ElementId;

/// Folds `operations` onto `base`, failing on the first operation that does
/// not apply.
pub fn fold(base: &ScriptState, operations: &[EditOperation]) -> Result<ScriptState> {
    let mut state = base.clone();
    for op in operations {
        apply_operation(&mut state, op)?;
    }
    Ok(state)
}

/// An operation skipped by [`fold_lenient`].
#[derive(Debug)]
pub struct SkippedOperation {
    /// Position of the operation in the folded slice.
    pub index: usize,
    /// Why it did not apply.
    pub error: Error,
}

/// Folds `operations` onto `base`, skipping operations that no longer apply.
///
/// Used for the derived view, where a refreshed baseline may have removed an
/// element that an older pending operation references.
pub fn fold_lenient(
    base: &ScriptState,
    operations: &[EditOperation],
) -> (ScriptState, Vec<SkippedOperation>) {
    let mut state = base.clone();
    let mut skipped = Vec::new();
    for (index, op) in operations.iter().enumerate() {
        if let Err(error) = apply_operation(&mut state, op) {
            tracing::warn!(
                operation = %op.id,
                kind = op.kind(),
                index,
                "Skipping operation that no longer applies: {error}"
            );
            skipped.push(SkippedOperation { index, error });
        }
    }
    (state, skipped)
}

/// Applies one operation, all or nothing.
pub fn apply_operation(state: &mut ScriptState, op: &EditOperation) -> Result<()> {
    let mut next = state.clone();
    apply_change(&mut next, &op.change)?;
    *state = next;
    Ok(())
}

fn invalid(change: &EditChange, reason: impl Into<String>) -> Error {
    Error::invalid(change.kind(), reason)
}

fn require<'a>(state: &'a mut ScriptState, id: &ElementId) -> Result<&'a mut ScriptElement> {
    state.get_mut(id).ok_or_else(|| Error::ElementNotFound(id.clone()))
}

fn require_group<'a>(
    state: &'a mut ScriptState,
    id: &ElementId,
    change: &EditChange,
) -> Result<&'a mut ScriptElement> {
    let element = require(state, id)?;
    if element.is_group() {
        Ok(element)
    } else {
        Err(invalid(change, format!("{id} is not a group")))
    }
}

fn apply_change(state: &mut ScriptState, change: &EditChange) -> Result<()> {
    match change {
        EditChange::Reorder { element_id, new_sequence, .. } => {
            let from = state
                .position(element_id)
                .ok_or_else(|| Error::ElementNotFound(element_id.clone()))?;
            let to = *new_sequence as usize;
            if to == 0 || to > state.len() {
                return Err(invalid(
                    change,
                    format!("sequence {new_sequence} outside 1..={}", state.len()),
                ));
            }
            let element = state.elements.remove(from);
            state.elements.insert(to - 1, element);
            state.resequence();
        }
        EditChange::BulkReorder { changes } => assign_sequences(state, changes, change)?,
        EditChange::UpdateElement { element_id, changes } => {
            let element = require(state, element_id)?;
            for field in changes {
                field.apply(element);
            }
        }
        EditChange::CreateElement { element, insert_index } => {
            if state.get(&element.element_id).is_some() {
                return Err(invalid(change, format!("{} already exists", element.element_id)));
            }
            check_parent(state, element, change)?;
            let index = insert_index.unwrap_or(state.len());
            if index > state.len() {
                return Err(invalid(
                    change,
                    format!("insert index {index} beyond {} elements", state.len()),
                ));
            }
            state.elements.insert(index, element.clone());
            state.resequence();
        }
        EditChange::DeleteElement { element } => {
            let index = state
                .position(&element.element_id)
                .ok_or_else(|| Error::ElementNotFound(element.element_id.clone()))?;
            if !state.children_of(&element.element_id).is_empty() {
                return Err(invalid(
                    change,
                    format!("group {} still has children; ungroup first", element.element_id),
                ));
            }
            state.elements.remove(index);
            state.resequence();
        }
        EditChange::UpdateGroupWithPropagation {
            group_id,
            changes,
            offset_delta_ms,
            affected_children,
        } => {
            let group = require_group(state, group_id, change)?;
            for field in changes {
                field.apply(group);
            }
            for child_id in affected_children {
                let child = require(state, child_id)?;
                child.offset_ms += offset_delta_ms;
            }
        }
        EditChange::EnableAutoSort { resequenced } => {
            state.auto_sort = true;
            if !resequenced.is_empty() {
                assign_sequences(state, resequenced, change)?;
            }
        }
        EditChange::DisableAutoSort { resequenced } => {
            state.auto_sort = false;
            if !resequenced.is_empty() {
                assign_sequences(state, resequenced, change)?;
            }
        }
        EditChange::ToggleGroupCollapse { group_id, collapsed } => {
            require_group(state, group_id, change)?.is_collapsed = *collapsed;
        }
        EditChange::BatchCollapseGroups { changes } => {
            for c in changes {
                require_group(state, &c.group_id, change)?.is_collapsed = c.new_collapsed;
            }
        }
        EditChange::CreateGroup { group, members } => {
            if !group.is_group() {
                return Err(invalid(change, format!("{} is not a group", group.element_id)));
            }
            if state.get(&group.element_id).is_some() {
                return Err(invalid(change, format!("{} already exists", group.element_id)));
            }
            check_parent(state, group, change)?;
            let index = (group.sequence.saturating_sub(1) as usize).min(state.len());
            state.elements.insert(index, group.clone());
            reparent(state, members)?;
            state.resequence();
        }
        EditChange::UngroupElements { group, members } => {
            let index = state
                .position(&group.element_id)
                .ok_or_else(|| Error::ElementNotFound(group.element_id.clone()))?;
            state.elements.remove(index);
            reparent(state, members)?;
            if !state.children_of(&group.element_id).is_empty() {
                return Err(invalid(
                    change,
                    format!("members of {} were not all reparented", group.element_id),
                ));
            }
            state.resequence();
        }
        EditChange::UpdateScriptInfo { changes } => {
            for field in changes {
                field.apply(&mut state.info);
            }
        }
    }
    Ok(())
}

/// A new element's parent must be an existing group one level up.
fn check_parent(state: &ScriptState, element: &ScriptElement, change: &EditChange) -> Result<()> {
    let Some(parent_id) = &element.parent_element_id else {
        return Ok(());
    };
    let parent = state
        .get(parent_id)
        .ok_or_else(|| Error::ElementNotFound(parent_id.clone()))?;
    if !parent.is_group() || parent.group_level + 1 != element.group_level {
        return Err(invalid(
            change,
            format!("{parent_id} is not a group at level {}", element.group_level.saturating_sub(1)),
        ));
    }
    Ok(())
}

fn reparent(state: &mut ScriptState, members: &[ParentChange]) -> Result<()> {
    for member in members {
        let element = require(state, &member.element_id)?;
        element.parent_element_id.clone_from(&member.new_parent);
        element.group_level = member.new_group_level;
    }
    Ok(())
}

/// Writes the listed sequences and reorders; the result must be a
/// permutation of `1..=len`.
fn assign_sequences(
    state: &mut ScriptState,
    changes: &[SequenceChange],
    change: &EditChange,
) -> Result<()> {
    for c in changes {
        require(state, &c.element_id)?.sequence = c.new_sequence;
    }
    let mut seen = HashSet::with_capacity(state.len());
    let len = state.len();
    let is_permutation = state
        .elements
        .iter()
        .all(|e| e.sequence >= 1 && e.sequence as usize <= len && seen.insert(e.sequence));
    if !is_permutation {
        return Err(invalid(change, "sequence reassignment leaves gaps or duplicates"));
    }
    state.elements.sort_by_key(|e| e.sequence);
    Ok(())
}
