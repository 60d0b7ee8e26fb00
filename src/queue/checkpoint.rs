//! Named, selective-diff snapshots.
//!
//! Each checkpoint stores only what changed since the checkpoint before it
//! (or since the server baseline for the first one). The full element set
//! at a checkpoint is rebuilt by replaying the chain of snapshots onto the
//! baseline, so checkpoints are only ever dropped as a suffix of the list.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::EditOperation;
use crate::script::{ElementPatch, ScriptInfo, ScriptState};
use crate::types::{CheckpointId, ElementId};

/// Why a checkpoint was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointType {
    /// Taken automatically before auto-sort resequences the script.
    AutoSort,
    /// Requested by the user.
    Manual,
}

/// Per-element entry of a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// `false` when the element was deleted since the previous checkpoint.
    #[serde(rename = "_exists")]
    pub exists: bool,
    /// Fields that differ from the previous checkpoint; every field for a
    /// newly created element.
    #[serde(flatten)]
    pub fields: ElementPatch,
}

/// A named restore point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCheckpoint {
    /// Unique id.
    pub id: CheckpointId,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Why it was created.
    #[serde(rename = "type")]
    pub checkpoint_type: CheckpointType,
    /// Human-readable label.
    pub description: String,
    /// Elements that changed since the previous checkpoint.
    pub element_snapshots: BTreeMap<ElementId, ElementSnapshot>,
    /// Script header, when it changed since the previous checkpoint.
    #[serde(default)]
    pub script_snapshot: Option<ScriptInfo>,
    /// Operations recorded between the previous checkpoint and this one.
    #[serde(default)]
    pub operations_since: Vec<EditOperation>,
    /// Element count at creation, checked on restore.
    pub total_element_count: usize,
    /// Log position the checkpoint was taken at.
    pub operation_index: usize,
}

impl EditCheckpoint {
    /// Records the difference between `previous` and `current`.
    pub fn capture(
        checkpoint_type: CheckpointType,
        description: impl Into<String>,
        previous: &ScriptState,
        current: &ScriptState,
        operations_since: Vec<EditOperation>,
        operation_index: usize,
    ) -> Self {
        let (element_snapshots, script_snapshot) = diff(previous, current);

        Self {
            id: CheckpointId::generate(),
            timestamp: Utc::now(),
            checkpoint_type,
            description: description.into(),
            element_snapshots,
            script_snapshot,
            operations_since,
            total_element_count: current.len(),
            operation_index,
        }
    }

    /// Recomputes the snapshots after the baseline under the chain changed.
    ///
    /// `previous` and `current` are the states at the previous checkpoint
    /// and at this one, folded from the new baseline. Id, label and log
    /// position are kept.
    pub fn rebase(&mut self, previous: &ScriptState, current: &ScriptState) {
        let (element_snapshots, script_snapshot) = diff(previous, current);
        self.element_snapshots = element_snapshots;
        self.script_snapshot = script_snapshot;
        self.total_element_count = current.len();
    }

    /// Overlays this checkpoint onto the state of the previous one.
    ///
    /// Deleted elements are removed, listed fields overwrite current values
    /// and unlisted elements are left alone.
    pub fn apply_to(&self, state: &mut ScriptState) {
        state
            .elements
            .retain(|e| !matches!(self.element_snapshots.get(&e.element_id), Some(s) if !s.exists));

        for (id, snapshot) in self.element_snapshots.iter().filter(|(_, s)| s.exists) {
            if let Some(element) = state.get_mut(id) {
                snapshot.fields.apply_to(element);
            } else if let Some(element) = snapshot.fields.to_element(id) {
                state.elements.push(element);
            } else {
                tracing::warn!(
                    checkpoint = %self.id,
                    element = %id,
                    "Snapshot of a new element is missing its type or offset"
                );
            }
        }

        if let Some(info) = &self.script_snapshot {
            state.info.clone_from(info);
        }
        // every changed sequence is recorded, so sorting restores the order
        state.elements.sort_by_key(|e| e.sequence);
    }
}

/// Rebuilds the script as it was at the last checkpoint of `chain`.
pub fn materialize(baseline: &ScriptState, chain: &[EditCheckpoint]) -> ScriptState {
    let mut state = baseline.clone();
    for checkpoint in chain {
        checkpoint.apply_to(&mut state);
    }
    state
}

type Snapshots = (BTreeMap<ElementId, ElementSnapshot>, Option<ScriptInfo>);

/// Per-element patches and the changed header between two states.
fn diff(previous: &ScriptState, current: &ScriptState) -> Snapshots {
    let before: HashMap<&ElementId, _> =
        previous.elements.iter().map(|e| (&e.element_id, e)).collect();

    let mut element_snapshots = BTreeMap::new();
    for element in &current.elements {
        let fields = match before.get(&element.element_id) {
            Some(old) => ElementPatch::diff(old, element),
            None => ElementPatch::full(element),
        };
        if !fields.is_empty() {
            element_snapshots
                .insert(element.element_id.clone(), ElementSnapshot { exists: true, fields });
        }
    }
    for element in &previous.elements {
        if current.get(&element.element_id).is_none() {
            element_snapshots.insert(
                element.element_id.clone(),
                ElementSnapshot { exists: false, fields: ElementPatch::default() },
            );
        }
    }

    let script_snapshot = (previous.info != current.info).then(|| current.info.clone());
    (element_snapshots, script_snapshot)
}
