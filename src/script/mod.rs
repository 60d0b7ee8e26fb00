//! Script element model.
//!
//! Provides the canonical shape of a script item and the whole-script state
//! that edit operations are folded onto.

/// Read-only display projections
pub mod display;
/// Elements and element field changes
pub mod element;
/// Script-level fields
pub mod info;

pub use element::{ElementPatch, ElementType, FieldChange, Priority, ScriptElement};
pub use info::{ScriptFieldChange, ScriptInfo, ScriptStatus};

use serde::{Deserialize, Serialize};

use crate::types::ElementId;

/// A complete script: header, auto-sort preference and elements.
///
/// `elements` is kept in sequence order, and after normalisation every
/// element's `sequence` equals its 1-based index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptState {
    /// Script header fields.
    #[serde(default)]
    pub info: ScriptInfo,
    /// Whether elements are displayed in time order.
    #[serde(default)]
    pub auto_sort: bool,
    /// Elements in sequence order.
    #[serde(default)]
    pub elements: Vec<ScriptElement>,
}

impl ScriptState {
    /// Creates a script from a server element list, normalising its order.
    pub fn new(info: ScriptInfo, auto_sort: bool, elements: Vec<ScriptElement>) -> Self {
        let mut state = Self { info, auto_sort, elements };
        state.normalize();
        state
    }

    /// Sorts elements by their sequence (stable) and renumbers them densely.
    pub fn normalize(&mut self) {
        self.elements.sort_by_key(|e| e.sequence);
        self.resequence();
    }

    /// Renumbers elements to match their position.
    pub fn resequence(&mut self) {
        for (idx, element) in self.elements.iter_mut().enumerate() {
            element.sequence = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        }
    }

    /// Number of elements, collapsed children included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the script has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Position of an element in sequence order.
    pub fn position(&self, id: &ElementId) -> Option<usize> {
        self.elements.iter().position(|e| &e.element_id == id)
    }

    /// Looks up an element by id.
    pub fn get(&self, id: &ElementId) -> Option<&ScriptElement> {
        self.elements.iter().find(|e| &e.element_id == id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut ScriptElement> {
        self.elements.iter_mut().find(|e| &e.element_id == id)
    }

    /// Direct children of a group, in sequence order.
    pub fn children_of(&self, group_id: &ElementId) -> Vec<&ScriptElement> {
        self.elements
            .iter()
            .filter(|e| e.parent_element_id.as_ref() == Some(group_id))
            .collect()
    }

    /// Every element nested under a group at any depth, in sequence order.
    pub fn descendants_of(&self, group_id: &ElementId) -> Vec<&ScriptElement> {
        let mut ancestors = vec![group_id.clone()];
        let mut found = Vec::new();
        // elements can reference a parent later in the list, so iterate until stable
        loop {
            let before = ancestors.len();
            for element in &self.elements {
                let nested = element
                    .parent_element_id
                    .as_ref()
                    .is_some_and(|p| ancestors.contains(p));
                if nested && !ancestors.contains(&element.element_id) {
                    ancestors.push(element.element_id.clone());
                }
            }
            if ancestors.len() == before {
                break;
            }
        }
        for element in &self.elements {
            if ancestors[1..].contains(&element.element_id) {
                found.push(element);
            }
        }
        found
    }

    /// Every group header.
    pub fn groups(&self) -> impl Iterator<Item = &ScriptElement> {
        self.elements.iter().filter(|e| e.is_group())
    }

    /// The list the UI shows.
    pub fn displayed(&self) -> Vec<ScriptElement> {
        display::displayed(&self.elements, self.auto_sort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_sequences() {
        let state = ScriptState::new(
            ScriptInfo::new("Show"),
            false,
            vec![
                ScriptElement::cue("b", 0).with_sequence(20),
                ScriptElement::cue("a", 0).with_sequence(10),
            ],
        );
        let order: Vec<(&str, u32)> =
            state.elements.iter().map(|e| (e.element_id.as_str(), e.sequence)).collect();
        assert_eq!(order, vec![("a", 1), ("b", 2)]);
    }

    #[test]
    fn descendants_include_nested_groups() {
        let state = ScriptState::new(
            ScriptInfo::default(),
            false,
            vec![
                ScriptElement::group("g1", 0).with_sequence(1),
                ScriptElement::group("g2", 0).with_parent("g1", 1).with_sequence(2),
                ScriptElement::cue("c1", 0).with_parent("g2", 2).with_sequence(3),
                ScriptElement::cue("c2", 0).with_sequence(4),
            ],
        );
        let ids: Vec<&str> = state
            .descendants_of(&ElementId::new("g1"))
            .iter()
            .map(|e| e.element_id.as_str())
            .collect();
        assert_eq!(ids, vec!["g2", "c1"]);
        assert_eq!(state.children_of(&ElementId::new("g1")).len(), 1);
    }
}
