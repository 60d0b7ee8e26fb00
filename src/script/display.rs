//! Read-only projections of a folded script for display.
//!
//! Nothing here is ever written back: the time-sorted order under auto-sort
//! and the hiding of collapsed group children are purely cosmetic.

use std::collections::{HashMap, HashSet};

use super::ScriptElement;
use crate::types::ElementId;

/// Elements sorted by `offset_ms`; elements with equal offsets keep their
/// relative input order.
pub fn time_ordered(elements: &[ScriptElement]) -> Vec<ScriptElement> {
    let mut sorted = elements.to_vec();
    // `sort_by_key` is stable
    sorted.sort_by_key(|e| e.offset_ms);
    sorted
}

/// Ids of every element that sits under a collapsed group, at any depth.
pub fn hidden_ids(elements: &[ScriptElement]) -> HashSet<ElementId> {
    let by_id: HashMap<&ElementId, &ScriptElement> =
        elements.iter().map(|e| (&e.element_id, e)).collect();

    elements
        .iter()
        .filter(|e| has_collapsed_ancestor(e, &by_id))
        .map(|e| e.element_id.clone())
        .collect()
}

fn has_collapsed_ancestor(
    element: &ScriptElement,
    by_id: &HashMap<&ElementId, &ScriptElement>,
) -> bool {
    let mut seen = HashSet::new();
    let mut parent = element.parent_element_id.as_ref();
    while let Some(id) = parent {
        if !seen.insert(id) {
            // cycle; treat as visible rather than loop forever
            return false;
        }
        match by_id.get(id) {
            Some(group) if group.is_collapsed => return true,
            Some(group) => parent = group.parent_element_id.as_ref(),
            None => return false,
        }
    }
    false
}

/// Drops elements hidden by a collapsed ancestor.
pub fn visible(elements: &[ScriptElement]) -> Vec<ScriptElement> {
    let hidden = hidden_ids(elements);
    elements
        .iter()
        .filter(|e| !hidden.contains(&e.element_id))
        .cloned()
        .collect()
}

/// The list the UI shows: time-sorted when auto-sort is on, collapsed
/// children removed.
pub fn displayed(elements: &[ScriptElement], auto_sort: bool) -> Vec<ScriptElement> {
    if auto_sort {
        visible(&time_ordered(elements))
    } else {
        visible(elements)
    }
}

/// Formats an offset as `[-]M:SS.mmm`, or `[-]H:MM:SS.mmm` past an hour.
pub fn format_offset(offset_ms: i64) -> String {
    let sign = if offset_ms < 0 { "-" } else { "" };
    let ms = offset_ms.unsigned_abs();
    let (hours, minutes, seconds, millis) =
        (ms / 3_600_000, ms / 60_000 % 60, ms / 1000 % 60, ms % 1000);
    if hours > 0 {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}.{millis:03}")
    } else {
        format!("{sign}{minutes}:{seconds:02}.{millis:03}")
    }
}
