//! Script elements and field-level change records.
//!
//! A [`ScriptElement`] is one row of a running script: a cue, a note, or a
//! group header. Edits to an element's user-facing fields are recorded as
//! [`FieldChange`] values that carry both the old and the new value, so any
//! change can be inverted without looking anything up.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{DepartmentId, ElementId};

/// The kind of script element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    /// A called cue for a department.
    #[default]
    Cue,
    /// A free-form note for the caller or crew.
    Note,
    /// A group header that other elements can be nested under.
    Group,
}

impl ElementType {
    /// Returns the human-readable name of this element type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cue => "Cue",
            Self::Note => "Note",
            Self::Group => "Group",
        }
    }
}

/// How important an element is during the show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Must never be missed; crew safety depends on it.
    Safety,
    /// Must not be missed.
    Critical,
    /// Important but recoverable.
    High,
    /// Regular cue.
    #[default]
    Normal,
    /// Nice to have.
    Low,
    /// May be skipped at the caller's discretion.
    Optional,
}

impl Priority {
    /// Returns all priority variants from most to least important.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Safety, Self::Critical, Self::High, Self::Normal, Self::Low, Self::Optional]
    }
}

/// A cue, note or group header in a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptElement {
    /// Stable identifier.
    pub element_id: ElementId,
    /// Cue, note or group.
    pub element_type: ElementType,
    /// 1-based position in the full script ordering.
    pub sequence: u32,
    /// Display name.
    #[serde(default)]
    pub element_name: String,
    /// Caller-facing cue label such as `LX 12`.
    #[serde(default)]
    pub cue_id: Option<String>,
    /// Time relative to show start; negative for pre-show items.
    pub offset_ms: i64,
    /// How long the element runs, if known.
    #[serde(default)]
    pub duration_ms: Option<i64>,
    /// Department that executes the cue.
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    /// Importance during the show.
    #[serde(default)]
    pub priority: Priority,
    /// Highlight color (hex string).
    #[serde(default)]
    pub custom_color: Option<String>,
    /// Where on stage the element happens.
    #[serde(default)]
    pub location_details: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub cue_notes: Option<String>,
    /// Group this element is nested under.
    #[serde(default)]
    pub parent_element_id: Option<ElementId>,
    /// Nesting depth; 0 for top-level elements.
    #[serde(default)]
    pub group_level: u32,
    /// Whether a group's children are hidden from the displayed list.
    #[serde(default)]
    pub is_collapsed: bool,
}

impl ScriptElement {
    /// Creates a top-level element with default field values.
    pub fn new(id: impl Into<ElementId>, element_type: ElementType, offset_ms: i64) -> Self {
        Self {
            element_id: id.into(),
            element_type,
            sequence: 0,
            element_name: String::new(),
            cue_id: None,
            offset_ms,
            duration_ms: None,
            department_id: None,
            priority: Priority::default(),
            custom_color: None,
            location_details: None,
            cue_notes: None,
            parent_element_id: None,
            group_level: 0,
            is_collapsed: false,
        }
    }

    /// Creates a cue.
    pub fn cue(id: impl Into<ElementId>, offset_ms: i64) -> Self {
        Self::new(id, ElementType::Cue, offset_ms)
    }

    /// Creates a note.
    pub fn note(id: impl Into<ElementId>, offset_ms: i64) -> Self {
        Self::new(id, ElementType::Note, offset_ms)
    }

    /// Creates a group header.
    pub fn group(id: impl Into<ElementId>, offset_ms: i64) -> Self {
        Self::new(id, ElementType::Group, offset_ms)
    }

    /// Builder: set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.element_name = name.into();
        self
    }

    /// Builder: set the sequence.
    #[must_use]
    pub const fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Builder: set the cue label.
    #[must_use]
    pub fn with_cue_id(mut self, cue_id: impl Into<String>) -> Self {
        self.cue_id = Some(cue_id.into());
        self
    }

    /// Builder: set the department.
    #[must_use]
    pub fn with_department(mut self, department: impl Into<DepartmentId>) -> Self {
        self.department_id = Some(department.into());
        self
    }

    /// Builder: set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set the highlight color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.custom_color = Some(color.into());
        self
    }

    /// Builder: nest under a group at the given depth.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<ElementId>, group_level: u32) -> Self {
        self.parent_element_id = Some(parent.into());
        self.group_level = group_level;
        self
    }

    /// Builder: set the collapsed flag.
    #[must_use]
    pub const fn collapsed(mut self, collapsed: bool) -> Self {
        self.is_collapsed = collapsed;
        self
    }

    /// Whether this element is a group header.
    pub fn is_group(&self) -> bool {
        self.element_type == ElementType::Group
    }
}

/// A change to one editable element field, with the value before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    /// Display name.
    ElementName {
        /// Value before the change.
        old: String,
        /// Value after the change.
        new: String,
    },
    /// Cue label.
    CueId {
        /// Value before the change.
        old: Option<String>,
        /// Value after the change.
        new: Option<String>,
    },
    /// Time offset.
    OffsetMs {
        /// Value before the change.
        old: i64,
        /// Value after the change.
        new: i64,
    },
    /// Duration.
    DurationMs {
        /// Value before the change.
        old: Option<i64>,
        /// Value after the change.
        new: Option<i64>,
    },
    /// Department.
    DepartmentId {
        /// Value before the change.
        old: Option<DepartmentId>,
        /// Value after the change.
        new: Option<DepartmentId>,
    },
    /// Priority.
    Priority {
        /// Value before the change.
        old: Priority,
        /// Value after the change.
        new: Priority,
    },
    /// Highlight color.
    CustomColor {
        /// Value before the change.
        old: Option<String>,
        /// Value after the change.
        new: Option<String>,
    },
    /// Location details.
    LocationDetails {
        /// Value before the change.
        old: Option<String>,
        /// Value after the change.
        new: Option<String>,
    },
    /// Notes.
    CueNotes {
        /// Value before the change.
        old: Option<String>,
        /// Value after the change.
        new: Option<String>,
    },
}

impl FieldChange {
    /// Name of the field this change touches.
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::ElementName { .. } => "element_name",
            Self::CueId { .. } => "cue_id",
            Self::OffsetMs { .. } => "offset_ms",
            Self::DurationMs { .. } => "duration_ms",
            Self::DepartmentId { .. } => "department_id",
            Self::Priority { .. } => "priority",
            Self::CustomColor { .. } => "custom_color",
            Self::LocationDetails { .. } => "location_details",
            Self::CueNotes { .. } => "cue_notes",
        }
    }

    /// Writes the new value into `element`.
    pub fn apply(&self, element: &mut ScriptElement) {
        match self {
            Self::ElementName { new, .. } => element.element_name.clone_from(new),
            Self::CueId { new, .. } => element.cue_id.clone_from(new),
            Self::OffsetMs { new, .. } => element.offset_ms = *new,
            Self::DurationMs { new, .. } => element.duration_ms = *new,
            Self::DepartmentId { new, .. } => element.department_id.clone_from(new),
            Self::Priority { new, .. } => element.priority = *new,
            Self::CustomColor { new, .. } => element.custom_color.clone_from(new),
            Self::LocationDetails { new, .. } => element.location_details.clone_from(new),
            Self::CueNotes { new, .. } => element.cue_notes.clone_from(new),
        }
    }

    /// The same change with old and new swapped.
    #[must_use]
    pub fn inverted(&self) -> Self {
        match self.clone() {
            Self::ElementName { old, new } => Self::ElementName { old: new, new: old },
            Self::CueId { old, new } => Self::CueId { old: new, new: old },
            Self::OffsetMs { old, new } => Self::OffsetMs { old: new, new: old },
            Self::DurationMs { old, new } => Self::DurationMs { old: new, new: old },
            Self::DepartmentId { old, new } => Self::DepartmentId { old: new, new: old },
            Self::Priority { old, new } => Self::Priority { old: new, new: old },
            Self::CustomColor { old, new } => Self::CustomColor { old: new, new: old },
            Self::LocationDetails { old, new } => Self::LocationDetails { old: new, new: old },
            Self::CueNotes { old, new } => Self::CueNotes { old: new, new: old },
        }
    }

    /// The minimal list of changes that turns `before` into `after`.
    ///
    /// Only editable fields are compared; structural fields (sequence,
    /// parent, nesting, collapse) have dedicated operations.
    pub fn diff(before: &ScriptElement, after: &ScriptElement) -> Vec<Self> {
        let mut changes = Vec::new();
        if before.element_name != after.element_name {
            changes.push(Self::ElementName {
                old: before.element_name.clone(),
                new: after.element_name.clone(),
            });
        }
        if before.cue_id != after.cue_id {
            changes.push(Self::CueId { old: before.cue_id.clone(), new: after.cue_id.clone() });
        }
        if before.offset_ms != after.offset_ms {
            changes.push(Self::OffsetMs { old: before.offset_ms, new: after.offset_ms });
        }
        if before.duration_ms != after.duration_ms {
            changes.push(Self::DurationMs { old: before.duration_ms, new: after.duration_ms });
        }
        if before.department_id != after.department_id {
            changes.push(Self::DepartmentId {
                old: before.department_id.clone(),
                new: after.department_id.clone(),
            });
        }
        if before.priority != after.priority {
            changes.push(Self::Priority { old: before.priority, new: after.priority });
        }
        if before.custom_color != after.custom_color {
            changes.push(Self::CustomColor {
                old: before.custom_color.clone(),
                new: after.custom_color.clone(),
            });
        }
        if before.location_details != after.location_details {
            changes.push(Self::LocationDetails {
                old: before.location_details.clone(),
                new: after.location_details.clone(),
            });
        }
        if before.cue_notes != after.cue_notes {
            changes.push(Self::CueNotes {
                old: before.cue_notes.clone(),
                new: after.cue_notes.clone(),
            });
        }
        changes
    }
}

/// Keeps an explicit `null` distinct from a missing key.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Returns `Some(current)` when it differs from `base`.
fn changed<T: PartialEq + Clone>(base: &T, current: &T) -> Option<T> {
    (base != current).then(|| current.clone())
}

/// A sparse set of element field values.
///
/// Every field is optional; a present field overwrites the element's value
/// when the patch is applied. Nullable fields use a nested option so that
/// "set to none" and "not mentioned" stay distinguishable, including in JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementPatch {
    /// Element type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ElementType>,
    /// Sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_name: Option<String>,
    /// Cue label.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub cue_id: Option<Option<String>>,
    /// Time offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_ms: Option<i64>,
    /// Duration.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub duration_ms: Option<Option<i64>>,
    /// Department.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub department_id: Option<Option<DepartmentId>>,
    /// Priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Highlight color.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub custom_color: Option<Option<String>>,
    /// Location details.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub location_details: Option<Option<String>>,
    /// Notes.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub cue_notes: Option<Option<String>>,
    /// Parent group.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
    pub parent_element_id: Option<Option<ElementId>>,
    /// Nesting depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_level: Option<u32>,
    /// Collapsed flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_collapsed: Option<bool>,
}

impl ElementPatch {
    /// The fields of `current` that differ from `base`.
    pub fn diff(base: &ScriptElement, current: &ScriptElement) -> Self {
        Self {
            element_type: changed(&base.element_type, &current.element_type),
            sequence: changed(&base.sequence, &current.sequence),
            element_name: changed(&base.element_name, &current.element_name),
            cue_id: changed(&base.cue_id, &current.cue_id),
            offset_ms: changed(&base.offset_ms, &current.offset_ms),
            duration_ms: changed(&base.duration_ms, &current.duration_ms),
            department_id: changed(&base.department_id, &current.department_id),
            priority: changed(&base.priority, &current.priority),
            custom_color: changed(&base.custom_color, &current.custom_color),
            location_details: changed(&base.location_details, &current.location_details),
            cue_notes: changed(&base.cue_notes, &current.cue_notes),
            parent_element_id: changed(&base.parent_element_id, &current.parent_element_id),
            group_level: changed(&base.group_level, &current.group_level),
            is_collapsed: changed(&base.is_collapsed, &current.is_collapsed),
        }
    }

    /// A patch carrying every field of `element`.
    pub fn full(element: &ScriptElement) -> Self {
        Self {
            element_type: Some(element.element_type),
            sequence: Some(element.sequence),
            element_name: Some(element.element_name.clone()),
            cue_id: Some(element.cue_id.clone()),
            offset_ms: Some(element.offset_ms),
            duration_ms: Some(element.duration_ms),
            department_id: Some(element.department_id.clone()),
            priority: Some(element.priority),
            custom_color: Some(element.custom_color.clone()),
            location_details: Some(element.location_details.clone()),
            cue_notes: Some(element.cue_notes.clone()),
            parent_element_id: Some(element.parent_element_id.clone()),
            group_level: Some(element.group_level),
            is_collapsed: Some(element.is_collapsed),
        }
    }

    /// Whether no field is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrites every present field on `element`.
    pub fn apply_to(&self, element: &mut ScriptElement) {
        if let Some(v) = self.element_type {
            element.element_type = v;
        }
        if let Some(v) = self.sequence {
            element.sequence = v;
        }
        if let Some(v) = &self.element_name {
            element.element_name.clone_from(v);
        }
        if let Some(v) = &self.cue_id {
            element.cue_id.clone_from(v);
        }
        if let Some(v) = self.offset_ms {
            element.offset_ms = v;
        }
        if let Some(v) = self.duration_ms {
            element.duration_ms = v;
        }
        if let Some(v) = &self.department_id {
            element.department_id.clone_from(v);
        }
        if let Some(v) = self.priority {
            element.priority = v;
        }
        if let Some(v) = &self.custom_color {
            element.custom_color.clone_from(v);
        }
        if let Some(v) = &self.location_details {
            element.location_details.clone_from(v);
        }
        if let Some(v) = &self.cue_notes {
            element.cue_notes.clone_from(v);
        }
        if let Some(v) = &self.parent_element_id {
            element.parent_element_id.clone_from(v);
        }
        if let Some(v) = self.group_level {
            element.group_level = v;
        }
        if let Some(v) = self.is_collapsed {
            element.is_collapsed = v;
        }
    }

    /// Builds a new element from a patch.
    ///
    /// Returns `None` unless the patch carries the element type and offset,
    /// which have no meaningful default.
    pub fn to_element(&self, id: &ElementId) -> Option<ScriptElement> {
        let mut element = ScriptElement::new(id.clone(), self.element_type?, self.offset_ms?);
        self.apply_to(&mut element);
        Some(element)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn diff_reports_only_changed_fields() {
        let before = ScriptElement::cue("c1", 1000).with_name("House to half");
        let mut after = before.clone();
        after.offset_ms = 1500;
        after.cue_notes = Some("wait for applause".into());

        let changes = FieldChange::diff(&before, &after);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], FieldChange::OffsetMs { old: 1000, new: 1500 });
        assert_eq!(changes[1].field_name(), "cue_notes");
    }

    #[test]
    fn inverted_change_restores_value() {
        let mut element = ScriptElement::cue("c1", 1000);
        let change = FieldChange::Priority { old: Priority::Normal, new: Priority::Safety };
        change.apply(&mut element);
        assert_eq!(element.priority, Priority::Safety);
        change.inverted().apply(&mut element);
        assert_eq!(element.priority, Priority::Normal);
    }

    #[test]
    fn field_change_json_is_tagged_by_field() {
        let change = FieldChange::OffsetMs { old: -500, new: 0 };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["field"], "offset_ms");
        assert_eq!(json["old"], -500);
    }

    #[test]
    fn patch_keeps_explicit_null_distinct_from_missing() {
        let base = ScriptElement::cue("c1", 0).with_color("#ff0000");
        let mut current = base.clone();
        current.custom_color = None;

        let patch = ElementPatch::diff(&base, &current);
        assert_eq!(patch.custom_color, Some(None));
        assert!(patch.cue_notes.is_none());

        let json = serde_json::to_string(&patch).unwrap();
        let back: ElementPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn full_patch_rebuilds_element() {
        let element = ScriptElement::note("n1", -3000)
            .with_name("Preshow announcement")
            .with_parent("g1", 1)
            .with_sequence(4);
        let rebuilt = ElementPatch::full(&element).to_element(&element.element_id).unwrap();
        assert_eq!(rebuilt, element);
        assert!(ElementPatch::default().to_element(&element.element_id).is_none());
    }
}
