//! The closed set of edit operations recorded in the log.
//!
//! Every operation carries enough old/new data to be inverted on its own,
//! and round-trips through JSON in the shape the persistence service audits:
//! a flat object with `id`, `timestamp`, `description` and a `type` tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::script::{FieldChange, ScriptElement, ScriptFieldChange, ScriptInfo};
use crate::types::{ElementId, OperationId};

/// A single sequence reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceChange {
    /// Element being moved.
    pub element_id: ElementId,
    /// Sequence before the move.
    pub old_sequence: u32,
    /// Sequence after the move.
    pub new_sequence: u32,
}

impl SequenceChange {
    /// The same change with old and new swapped.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            element_id: self.element_id.clone(),
            old_sequence: self.new_sequence,
            new_sequence: self.old_sequence,
        }
    }
}

/// A single collapse flag change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseChange {
    /// Group header.
    pub group_id: ElementId,
    /// Flag before the change.
    pub old_collapsed: bool,
    /// Flag after the change.
    pub new_collapsed: bool,
}

/// A change of parent group and nesting depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentChange {
    /// Element being reparented.
    pub element_id: ElementId,
    /// Parent before the change.
    pub old_parent: Option<ElementId>,
    /// Parent after the change.
    pub new_parent: Option<ElementId>,
    /// Nesting depth before the change.
    pub old_group_level: u32,
    /// Nesting depth after the change.
    pub new_group_level: u32,
}

impl ParentChange {
    /// The same change with old and new swapped.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            element_id: self.element_id.clone(),
            old_parent: self.new_parent.clone(),
            new_parent: self.old_parent.clone(),
            old_group_level: self.new_group_level,
            new_group_level: self.old_group_level,
        }
    }
}

/// What an operation does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditChange {
    /// Move one element to a new sequence; everything between shifts by one.
    Reorder {
        /// Element being moved.
        element_id: ElementId,
        /// Sequence before the move.
        old_sequence: u32,
        /// Sequence after the move.
        new_sequence: u32,
    },
    /// Reassign several sequences at once (group moves).
    BulkReorder {
        /// Every sequence that changes.
        changes: Vec<SequenceChange>,
    },
    /// Change editable fields of one element.
    UpdateElement {
        /// Element being edited.
        element_id: ElementId,
        /// Field changes.
        changes: Vec<FieldChange>,
    },
    /// Add an element.
    CreateElement {
        /// Full element payload.
        element: ScriptElement,
        /// Position to insert at; appended when absent.
        insert_index: Option<usize>,
    },
    /// Remove an element.
    DeleteElement {
        /// Full element payload as it was before deletion.
        element: ScriptElement,
    },
    /// Change a group header and shift its children by the same offset delta.
    UpdateGroupWithPropagation {
        /// Group header.
        group_id: ElementId,
        /// Field changes on the header.
        changes: Vec<FieldChange>,
        /// Offset shift applied to every affected child.
        offset_delta_ms: i64,
        /// Children that move with the header.
        affected_children: Vec<ElementId>,
    },
    /// Turn auto-sort on, resequencing elements into time order.
    EnableAutoSort {
        /// Sequence reassignments produced by enabling.
        resequenced: Vec<SequenceChange>,
    },
    /// Turn auto-sort off.
    DisableAutoSort {
        /// Sequence reassignments applied while disabling; only non-empty
        /// when undoing an enable.
        #[serde(default)]
        resequenced: Vec<SequenceChange>,
    },
    /// Collapse or expand one group.
    ToggleGroupCollapse {
        /// Group header.
        group_id: ElementId,
        /// Flag after the change.
        collapsed: bool,
    },
    /// Collapse or expand several groups.
    BatchCollapseGroups {
        /// Flag changes.
        changes: Vec<CollapseChange>,
    },
    /// Insert a group header and nest elements under it.
    CreateGroup {
        /// Group payload; its `sequence` is the insert position.
        group: ScriptElement,
        /// Reparented elements, deeper descendants included.
        members: Vec<ParentChange>,
    },
    /// Remove a group header, lifting its members one level up.
    UngroupElements {
        /// Group payload as it was before removal.
        group: ScriptElement,
        /// Reparented elements, deeper descendants included.
        members: Vec<ParentChange>,
    },
    /// Change script header fields.
    UpdateScriptInfo {
        /// Field changes.
        changes: Vec<ScriptFieldChange>,
    },
}

impl EditChange {
    /// Wire name of the variant.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Reorder { .. } => "REORDER",
            Self::BulkReorder { .. } => "BULK_REORDER",
            Self::UpdateElement { .. } => "UPDATE_ELEMENT",
            Self::CreateElement { .. } => "CREATE_ELEMENT",
            Self::DeleteElement { .. } => "DELETE_ELEMENT",
            Self::UpdateGroupWithPropagation { .. } => "UPDATE_GROUP_WITH_PROPAGATION",
            Self::EnableAutoSort { .. } => "ENABLE_AUTO_SORT",
            Self::DisableAutoSort { .. } => "DISABLE_AUTO_SORT",
            Self::ToggleGroupCollapse { .. } => "TOGGLE_GROUP_COLLAPSE",
            Self::BatchCollapseGroups { .. } => "BATCH_COLLAPSE_GROUPS",
            Self::CreateGroup { .. } => "CREATE_GROUP",
            Self::UngroupElements { .. } => "UNGROUP_ELEMENTS",
            Self::UpdateScriptInfo { .. } => "UPDATE_SCRIPT_INFO",
        }
    }

    /// The change that undoes this one, built from this payload alone.
    #[must_use]
    pub fn inverted(&self) -> Self {
        match self {
            Self::Reorder { element_id, old_sequence, new_sequence } => Self::Reorder {
                element_id: element_id.clone(),
                old_sequence: *new_sequence,
                new_sequence: *old_sequence,
            },
            Self::BulkReorder { changes } => Self::BulkReorder {
                changes: changes.iter().map(SequenceChange::inverted).collect(),
            },
            Self::UpdateElement { element_id, changes } => Self::UpdateElement {
                element_id: element_id.clone(),
                changes: changes.iter().rev().map(FieldChange::inverted).collect(),
            },
            Self::CreateElement { element, .. } => Self::DeleteElement { element: element.clone() },
            Self::DeleteElement { element } => Self::CreateElement {
                element: element.clone(),
                insert_index: Some(element.sequence.saturating_sub(1) as usize),
            },
            Self::UpdateGroupWithPropagation {
                group_id,
                changes,
                offset_delta_ms,
                affected_children,
            } => Self::UpdateGroupWithPropagation {
                group_id: group_id.clone(),
                changes: changes.iter().rev().map(FieldChange::inverted).collect(),
                offset_delta_ms: -offset_delta_ms,
                affected_children: affected_children.clone(),
            },
            Self::EnableAutoSort { resequenced } => Self::DisableAutoSort {
                resequenced: resequenced.iter().map(SequenceChange::inverted).collect(),
            },
            Self::DisableAutoSort { resequenced } => Self::EnableAutoSort {
                resequenced: resequenced.iter().map(SequenceChange::inverted).collect(),
            },
            Self::ToggleGroupCollapse { group_id, collapsed } => Self::ToggleGroupCollapse {
                group_id: group_id.clone(),
                collapsed: !collapsed,
            },
            Self::BatchCollapseGroups { changes } => Self::BatchCollapseGroups {
                changes: changes
                    .iter()
                    .map(|c| CollapseChange {
                        group_id: c.group_id.clone(),
                        old_collapsed: c.new_collapsed,
                        new_collapsed: c.old_collapsed,
                    })
                    .collect(),
            },
            Self::CreateGroup { group, members } => Self::UngroupElements {
                group: group.clone(),
                members: members.iter().map(ParentChange::inverted).collect(),
            },
            Self::UngroupElements { group, members } => Self::CreateGroup {
                group: group.clone(),
                members: members.iter().map(ParentChange::inverted).collect(),
            },
            Self::UpdateScriptInfo { changes } => Self::UpdateScriptInfo {
                changes: changes.iter().rev().map(ScriptFieldChange::inverted).collect(),
            },
        }
    }
}

/// One recorded edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOperation {
    /// Unique id.
    pub id: OperationId,
    /// When the edit was made.
    pub timestamp: DateTime<Utc>,
    /// Human-readable summary for history lists.
    pub description: String,
    /// The edit itself.
    #[serde(flatten)]
    pub change: EditChange,
}

impl EditOperation {
    /// Wraps a change with a fresh id and the current time.
    pub fn new(description: impl Into<String>, change: EditChange) -> Self {
        Self {
            id: OperationId::generate(),
            timestamp: Utc::now(),
            description: description.into(),
            change,
        }
    }

    /// Wire name of the operation type.
    pub const fn kind(&self) -> &'static str {
        self.change.kind()
    }

    /// A new operation that undoes this one.
    #[must_use]
    pub fn invert(&self) -> Self {
        Self::new(format!("Revert: {}", self.description), self.change.inverted())
    }

    /// Moves an element; `None` when the sequence does not change.
    pub fn reorder(element: &ScriptElement, new_sequence: u32) -> Option<Self> {
        (element.sequence != new_sequence).then(|| {
            Self::new(
                format!("Move {} to position {new_sequence}", label(element)),
                EditChange::Reorder {
                    element_id: element.element_id.clone(),
                    old_sequence: element.sequence,
                    new_sequence,
                },
            )
        })
    }

    /// Records the field edits between two versions of an element; `None`
    /// when nothing editable changed.
    pub fn update_element(before: &ScriptElement, after: &ScriptElement) -> Option<Self> {
        let changes = FieldChange::diff(before, after);
        if changes.is_empty() {
            return None;
        }
        let fields: Vec<&str> = changes.iter().map(FieldChange::field_name).collect();
        Some(Self::new(
            format!("Edit {} ({})", label(before), fields.join(", ")),
            EditChange::UpdateElement { element_id: before.element_id.clone(), changes },
        ))
    }

    /// Adds an element, appended when `insert_index` is `None`.
    pub fn create_element(element: ScriptElement, insert_index: Option<usize>) -> Self {
        Self::new(
            format!("Add {}", label(&element)),
            EditChange::CreateElement { element, insert_index },
        )
    }

    /// Removes an element; pass the element as currently folded.
    pub fn delete_element(element: &ScriptElement) -> Self {
        Self::new(
            format!("Delete {}", label(element)),
            EditChange::DeleteElement { element: element.clone() },
        )
    }

    /// Records script header edits; `None` when nothing changed.
    pub fn update_script_info(before: &ScriptInfo, after: &ScriptInfo) -> Option<Self> {
        let changes = ScriptFieldChange::diff(before, after);
        (!changes.is_empty())
            .then(|| Self::new("Edit script details", EditChange::UpdateScriptInfo { changes }))
    }
}

/// Short human label for an element used in descriptions.
pub(crate) fn label(element: &ScriptElement) -> String {
    if element.element_name.is_empty() {
        format!("{} {}", element.element_type.name().to_lowercase(), element.element_id)
    } else {
        format!("'{}'", element.element_name)
    }
}
