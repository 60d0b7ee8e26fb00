//! Group operation builders.
//!
//! Turns a user intent (retime a group, group a selection, ungroup) into a
//! single operation whose payload already carries everything folding and
//! undo need: the affected children, the reparenting of every member and the
//! full group element.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::queue::operation::label;
use crate::queue::{EditChange, EditOperation, ParentChange};
use crate::script::{FieldChange, ScriptElement, ScriptState};
use crate::types::ElementId;

/// Records edits to a group header, carrying an offset change through to
/// its direct children.
///
/// `updated` is the group with its new field values. Returns `None` when no
/// editable field changed.
pub fn update_group_with_propagation(
    script: &ScriptState,
    updated: &ScriptElement,
) -> Result<Option<EditOperation>> {
    let group = script
        .get(&updated.element_id)
        .ok_or_else(|| Error::ElementNotFound(updated.element_id.clone()))?;
    if !group.is_group() {
        return Err(Error::invalid(
            "UPDATE_GROUP_WITH_PROPAGATION",
            format!("{} is not a group", group.element_id),
        ));
    }

    let changes = FieldChange::diff(group, updated);
    if changes.is_empty() {
        return Ok(None);
    }
    let offset_delta_ms = updated.offset_ms - group.offset_ms;
    let affected_children: Vec<ElementId> = if offset_delta_ms == 0 {
        Vec::new()
    } else {
        script.children_of(&group.element_id).iter().map(|c| c.element_id.clone()).collect()
    };

    let description = if affected_children.is_empty() {
        format!("Edit group {}", label(group))
    } else {
        format!(
            "Edit group {} and shift {} children by {offset_delta_ms} ms",
            label(group),
            affected_children.len()
        )
    };
    Ok(Some(EditOperation::new(
        description,
        EditChange::UpdateGroupWithPropagation {
            group_id: group.element_id.clone(),
            changes,
            offset_delta_ms,
            affected_children,
        },
    )))
}

/// Groups the selected elements under a new group header.
///
/// The selection must share one parent. The header takes the position and
/// offset of the earliest selected element; selected elements move one level
/// down along with everything nested under them.
pub fn create_group(
    script: &ScriptState,
    name: impl Into<String>,
    selection: &[ElementId],
) -> Result<EditOperation> {
    let invalid = |reason: String| Error::invalid("CREATE_GROUP", reason);

    let mut seen = HashSet::new();
    let mut members: Vec<&ScriptElement> = Vec::with_capacity(selection.len());
    for id in selection {
        let element = script.get(id).ok_or_else(|| Error::ElementNotFound(id.clone()))?;
        if seen.insert(id) {
            members.push(element);
        }
    }
    let Some(first) = members.iter().min_by_key(|e| e.sequence).copied() else {
        return Err(invalid("nothing selected".to_string()));
    };
    if members.iter().any(|e| e.parent_element_id != first.parent_element_id) {
        return Err(invalid("selected elements have different parents".to_string()));
    }

    let group_id = ElementId::generate();
    let mut group = ScriptElement::group(
        group_id.clone(),
        members.iter().map(|e| e.offset_ms).min().unwrap_or(first.offset_ms),
    )
    .with_name(name)
    .with_sequence(first.sequence);
    group.parent_element_id.clone_from(&first.parent_element_id);
    group.group_level = first.group_level;

    let mut changes = Vec::new();
    for member in &members {
        changes.push(ParentChange {
            element_id: member.element_id.clone(),
            old_parent: member.parent_element_id.clone(),
            new_parent: Some(group_id.clone()),
            old_group_level: member.group_level,
            new_group_level: member.group_level + 1,
        });
        for nested in script.descendants_of(&member.element_id) {
            changes.push(ParentChange {
                element_id: nested.element_id.clone(),
                old_parent: nested.parent_element_id.clone(),
                new_parent: nested.parent_element_id.clone(),
                old_group_level: nested.group_level,
                new_group_level: nested.group_level + 1,
            });
        }
    }

    Ok(EditOperation::new(
        format!("Group {} elements as '{}'", members.len(), group.element_name),
        EditChange::CreateGroup { group, members: changes },
    ))
}

/// Removes a group header, lifting its members one level.
///
/// Direct children take the group's own parent and level, so a top-level
/// group's children end up with no parent at level 0. Offsets are untouched.
pub fn ungroup(script: &ScriptState, group_id: &ElementId) -> Result<EditOperation> {
    let group = script.get(group_id).ok_or_else(|| Error::ElementNotFound(group_id.clone()))?;
    if !group.is_group() {
        return Err(Error::invalid("UNGROUP_ELEMENTS", format!("{group_id} is not a group")));
    }

    let members = script
        .descendants_of(group_id)
        .into_iter()
        .map(|e| {
            let direct = e.parent_element_id.as_ref() == Some(group_id);
            ParentChange {
                element_id: e.element_id.clone(),
                old_parent: e.parent_element_id.clone(),
                new_parent: if direct {
                    group.parent_element_id.clone()
                } else {
                    e.parent_element_id.clone()
                },
                old_group_level: e.group_level,
                new_group_level: e.group_level.saturating_sub(1),
            }
        })
        .collect();

    Ok(EditOperation::new(
        format!("Ungroup {}", label(group)),
        EditChange::UngroupElements { group: group.clone(), members },
    ))
}
