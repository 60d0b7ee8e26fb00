//! Drag-to-reorder with auto-sort conflict resolution.
//!
//! The resolver holds only transient drag state; it never touches the edit
//! queue. Each step takes the current folded script and, once a drop is
//! settled, hands back the operations to record (all of them together, with
//! [`crate::queue::EditQueue::apply_local_changes`]).
//!
//! ```text
//! Idle -> Pressed -(hold past debounce)-> Dragging -(drop)-> Idle
//!                                              \-(auto-sort, neighbour at another time)-> AwaitingChoice -> Idle
//! ```

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::operation::label;
use crate::queue::{EditChange, EditOperation, SequenceChange};
use crate::script::{ScriptElement, ScriptState};
use crate::services::grouping;
use crate::types::ElementId;

/// An element being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    /// The dragged element.
    pub element_id: ElementId,
    /// Its index in `draggable` when the drag started.
    pub origin_index: usize,
    /// The list shown while dragging: the displayed list minus the children
    /// of a dragged expanded group.
    pub draggable: Vec<ScriptElement>,
}

/// A drop that conflicts with auto-sort, waiting for the user to choose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    /// The dragged element as it was before the drop.
    pub dragged: ScriptElement,
    /// Neighbour above the drop position.
    pub above: Option<ScriptElement>,
    /// Neighbour below the drop position.
    pub below: Option<ScriptElement>,
    /// The reorder operations the drop produces, not yet recorded.
    pub moves: Vec<EditOperation>,
}

/// Where the resolver is in a drag gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    /// No gesture.
    #[default]
    Idle,
    /// Pointer is down but has not been held long enough to drag.
    Pressed {
        /// Element under the pointer.
        element_id: ElementId,
        /// When the pointer went down.
        since: Instant,
    },
    /// A drag is in progress.
    Dragging(DragSession),
    /// A drop is waiting on a [`Resolution`].
    AwaitingChoice(PendingMove),
}

/// How the user settles an auto-sort conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Turn auto-sort off and keep the drop position.
    DisableAutoSort,
    /// Give the dragged element the offset of the element above.
    MatchAbove,
    /// Give the dragged element the offset of the element below.
    MatchBelow,
    /// Give the dragged element a chosen offset.
    CustomOffset(i64),
}

/// Result of dropping a dragged element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Dropped where it started; nothing to record.
    Unchanged,
    /// Record these operations.
    Commit(Vec<EditOperation>),
    /// A conflict needs a [`Resolution`]; see [`ReorderResolver::pending`].
    AwaitingChoice,
}

/// Drag gesture state machine.
#[derive(Debug, Clone)]
pub struct ReorderResolver {
    debounce: Duration,
    state: DragState,
}

impl ReorderResolver {
    /// Creates an idle resolver.
    pub const fn new(debounce: Duration) -> Self {
        Self { debounce, state: DragState::Idle }
    }

    /// Creates an idle resolver with the configured debounce.
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.drag_debounce())
    }

    /// Current gesture state.
    pub const fn state(&self) -> &DragState {
        &self.state
    }

    /// The list to render while dragging.
    pub fn draggable(&self) -> Option<&[ScriptElement]> {
        match &self.state {
            DragState::Dragging(session) => Some(&session.draggable),
            _ => None,
        }
    }

    /// The conflict waiting on a resolution.
    pub const fn pending(&self) -> Option<&PendingMove> {
        match &self.state {
            DragState::AwaitingChoice(pending) => Some(pending),
            _ => None,
        }
    }

    /// Pointer down on an element.
    pub fn press(&mut self, element_id: ElementId, at: Instant) {
        self.state = DragState::Pressed { element_id, since: at };
    }

    /// Pointer still down; starts the drag once held past the debounce.
    ///
    /// Returns whether a drag is in progress.
    pub fn hold(&mut self, script: &ScriptState, at: Instant) -> Result<bool> {
        match &self.state {
            DragState::Pressed { element_id, since }
                if at.saturating_duration_since(*since) >= self.debounce =>
            {
                let session = begin_drag(script, element_id)?;
                tracing::debug!(element = %session.element_id, "Drag started");
                self.state = DragState::Dragging(session);
                Ok(true)
            }
            DragState::Dragging(_) => Ok(true),
            _ => Ok(false),
        }
    }

    /// Pointer up before the drag started: a click. Returns the clicked
    /// element.
    pub fn release(&mut self) -> Option<ElementId> {
        match std::mem::take(&mut self.state) {
            DragState::Pressed { element_id, .. } => Some(element_id),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Drops the dragged element at `target_index` of the draggable list.
    pub fn drop_at(&mut self, script: &ScriptState, target_index: usize) -> Result<DropOutcome> {
        let DragState::Dragging(session) = &self.state else {
            return Err(Error::invalid("drop", "no drag in progress"));
        };

        let mut order = session.draggable.clone();
        let dragged = order.remove(session.origin_index);
        let target = target_index.min(order.len());
        if target == session.origin_index {
            self.state = DragState::Idle;
            return Ok(DropOutcome::Unchanged);
        }
        order.insert(target, dragged.clone());
        let above = target.checked_sub(1).map(|i| order[i].clone());
        let below = order.get(target + 1).cloned();

        let moves = sequence_moves(script, &order, &dragged)?;
        // under auto-sort only a drop between same-time neighbours is free
        let conflict = script.auto_sort
            && (above.as_ref().is_some_and(|a| a.offset_ms != dragged.offset_ms)
                || below.as_ref().is_some_and(|b| b.offset_ms != dragged.offset_ms));

        if conflict {
            tracing::debug!(element = %dragged.element_id, "Drop conflicts with auto-sort");
            self.state = DragState::AwaitingChoice(PendingMove { dragged, above, below, moves });
            return Ok(DropOutcome::AwaitingChoice);
        }
        self.state = DragState::Idle;
        if moves.is_empty() {
            Ok(DropOutcome::Unchanged)
        } else {
            Ok(DropOutcome::Commit(moves))
        }
    }

    /// Settles a pending conflict, returning the operations to record.
    ///
    /// On error the conflict stays pending.
    pub fn resolve(
        &mut self,
        script: &ScriptState,
        resolution: Resolution,
    ) -> Result<Vec<EditOperation>> {
        let Some(pending) = self.pending() else {
            return Err(Error::invalid("resolve", "no drop is awaiting a choice"));
        };

        let offset = match resolution {
            Resolution::DisableAutoSort => None,
            Resolution::MatchAbove => Some(neighbour_offset(pending.above.as_ref(), "above")?),
            Resolution::MatchBelow => Some(neighbour_offset(pending.below.as_ref(), "below")?),
            Resolution::CustomOffset(offset) => Some(offset),
        };

        let ops = match offset {
            None => {
                let mut ops = vec![EditOperation::new(
                    "Disable auto-sort",
                    EditChange::DisableAutoSort { resequenced: Vec::new() },
                )];
                ops.extend(pending.moves.iter().cloned());
                ops
            }
            Some(offset) => {
                let mut ops = pending.moves.clone();
                ops.extend(retime(script, &pending.dragged, offset)?);
                ops
            }
        };
        self.state = DragState::Idle;
        Ok(ops)
    }

    /// Abandons the gesture; nothing is recorded.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

fn neighbour_offset(neighbour: Option<&ScriptElement>, side: &str) -> Result<i64> {
    neighbour
        .map(|e| e.offset_ms)
        .ok_or_else(|| Error::invalid("resolve", format!("no element {side} the drop position")))
}

/// Offset change for the dragged element; groups carry their children.
fn retime(
    script: &ScriptState,
    dragged: &ScriptElement,
    offset_ms: i64,
) -> Result<Option<EditOperation>> {
    let mut updated = dragged.clone();
    updated.offset_ms = offset_ms;
    if dragged.is_group() {
        grouping::update_group_with_propagation(script, &updated)
    } else {
        Ok(EditOperation::update_element(dragged, &updated))
    }
}

fn begin_drag(script: &ScriptState, element_id: &ElementId) -> Result<DragSession> {
    let dragged =
        script.get(element_id).ok_or_else(|| Error::ElementNotFound(element_id.clone()))?;
    let mut draggable = script.displayed();
    if dragged.is_group() && !dragged.is_collapsed {
        let nested: HashSet<&ElementId> =
            script.descendants_of(element_id).iter().map(|e| &e.element_id).collect();
        draggable.retain(|e| !nested.contains(&e.element_id));
    }
    let origin_index = draggable
        .iter()
        .position(|e| &e.element_id == element_id)
        .ok_or_else(|| Error::invalid("drag", format!("{element_id} is hidden")))?;
    Ok(DragSession { element_id: element_id.clone(), origin_index, draggable })
}

/// Rebuilds the full element order from the post-drop visible order and
/// turns the dragged element's new place into reorder operations.
fn sequence_moves(
    script: &ScriptState,
    visible_order: &[ScriptElement],
    dragged: &ScriptElement,
) -> Result<Vec<EditOperation>> {
    let visible: HashSet<&ElementId> = visible_order.iter().map(|e| &e.element_id).collect();

    // hidden elements follow their nearest visible ancestor, in sequence order
    let mut trailing: HashMap<&ElementId, Vec<&ScriptElement>> = HashMap::new();
    let mut orphans = Vec::new();
    for element in script.elements.iter().filter(|e| !visible.contains(&e.element_id)) {
        match nearest_visible_ancestor(script, element, &visible) {
            Some(anchor) => trailing.entry(anchor).or_default().push(element),
            None => orphans.push(element),
        }
    }
    let mut full: Vec<&ScriptElement> = Vec::with_capacity(script.len());
    for element in visible_order {
        full.push(element);
        if let Some(hidden) = trailing.get(&element.element_id) {
            full.extend(hidden.iter().copied());
        }
    }
    full.extend(orphans);

    let position = full
        .iter()
        .position(|e| e.element_id == dragged.element_id)
        .ok_or_else(|| Error::ElementNotFound(dragged.element_id.clone()))?;
    let new_sequence = u32::try_from(position + 1)
        .map_err(|_| Error::invalid("REORDER", "script too long"))?;

    let carries_children =
        dragged.is_group() && !script.children_of(&dragged.element_id).is_empty();
    if !carries_children && is_single_move(script, &full, position) {
        return Ok(EditOperation::reorder(dragged, new_sequence).into_iter().collect());
    }

    let changes: Vec<SequenceChange> = full
        .iter()
        .zip(1u32..)
        .filter(|(e, seq)| e.sequence != *seq)
        .map(|(e, seq)| SequenceChange {
            element_id: e.element_id.clone(),
            old_sequence: e.sequence,
            new_sequence: seq,
        })
        .collect();
    if changes.is_empty() {
        return Ok(Vec::new());
    }
    let noun = if carries_children { "group " } else { "" };
    Ok(vec![EditOperation::new(
        format!("Move {noun}{} to position {new_sequence}", label(dragged)),
        EditChange::BulkReorder { changes },
    )])
}

/// Whether `full` is the sequence order with only the element now at
/// `position` moved, so a single REORDER reproduces it.
///
/// Under auto-sort the dropped list is time-ordered, which drifts from the
/// sequence order once anything has been retimed.
fn is_single_move(script: &ScriptState, full: &[&ScriptElement], position: usize) -> bool {
    let moved = &full[position].element_id;
    let mut rest = full.iter().copied().filter(|e| &e.element_id != moved);
    script
        .elements
        .iter()
        .filter(|e| &e.element_id != moved)
        .all(|e| rest.next().is_some_and(|r| r.element_id == e.element_id))
        && rest.next().is_none()
}

fn nearest_visible_ancestor<'a>(
    script: &'a ScriptState,
    element: &ScriptElement,
    visible: &HashSet<&ElementId>,
) -> Option<&'a ElementId> {
    let mut seen = HashSet::new();
    let mut parent = element.parent_element_id.as_ref();
    while let Some(id) = parent {
        if !seen.insert(id) {
            return None;
        }
        let group = script.get(id)?;
        if visible.contains(&group.element_id) {
            return Some(&group.element_id);
        }
        parent = group.parent_element_id.as_ref();
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::queue::fold;
    use crate::script::ScriptInfo;

    const DEBOUNCE: Duration = Duration::from_millis(80);

    fn script(auto_sort: bool, elements: Vec<ScriptElement>) -> ScriptState {
        let elements = elements
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.with_sequence(u32::try_from(i + 1).unwrap()))
            .collect();
        ScriptState::new(ScriptInfo::new("Test"), auto_sort, elements)
    }

    fn abc(auto_sort: bool) -> ScriptState {
        script(
            auto_sort,
            vec![
                ScriptElement::cue("a", 0),
                ScriptElement::cue("b", 1000),
                ScriptElement::cue("c", 2000),
            ],
        )
    }

    fn start_drag(resolver: &mut ReorderResolver, state: &ScriptState, id: &str) {
        let t0 = Instant::now();
        resolver.press(ElementId::new(id), t0);
        assert!(resolver.hold(state, t0 + DEBOUNCE).unwrap());
    }

    fn ids(state: &ScriptState) -> Vec<&str> {
        state.elements.iter().map(|e| e.element_id.as_str()).collect()
    }

    #[test]
    fn short_press_is_a_click() {
        let state = abc(false);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        let t0 = Instant::now();
        resolver.press(ElementId::new("b"), t0);
        assert!(!resolver.hold(&state, t0 + Duration::from_millis(20)).unwrap());
        assert_eq!(resolver.release(), Some(ElementId::new("b")));
        assert_eq!(resolver.state(), &DragState::Idle);
    }

    #[test]
    fn manual_order_commits_single_reorder() {
        let state = abc(false);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");

        let DropOutcome::Commit(ops) = resolver.drop_at(&state, 0).unwrap() else {
            panic!("expected a direct commit");
        };
        assert_eq!(ops.len(), 1);
        match &ops[0].change {
            EditChange::Reorder { element_id, old_sequence, new_sequence } => {
                assert_eq!(element_id.as_str(), "c");
                assert_eq!((*old_sequence, *new_sequence), (3, 1));
            }
            other => panic!("unexpected change {other:?}"),
        }
        assert_eq!(resolver.state(), &DragState::Idle);
        assert_eq!(ids(&fold::fold(&state, &ops).unwrap()), vec!["c", "a", "b"]);
    }

    #[test]
    fn dropping_in_place_records_nothing() {
        let state = abc(false);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "b");
        assert_eq!(resolver.drop_at(&state, 1).unwrap(), DropOutcome::Unchanged);
    }

    #[test]
    fn auto_sort_time_conflict_awaits_choice() {
        let state = abc(true);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");

        assert_eq!(resolver.drop_at(&state, 1).unwrap(), DropOutcome::AwaitingChoice);
        let pending = resolver.pending().unwrap();
        assert_eq!(pending.above.as_ref().unwrap().element_id.as_str(), "a");
        assert_eq!(pending.below.as_ref().unwrap().element_id.as_str(), "b");
    }

    #[test]
    fn equal_offsets_commit_under_auto_sort() {
        let state = script(
            true,
            vec![
                ScriptElement::cue("a", 1000),
                ScriptElement::cue("b", 1000),
                ScriptElement::cue("c", 1000),
            ],
        );
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");
        assert!(matches!(resolver.drop_at(&state, 1).unwrap(), DropOutcome::Commit(_)));
    }

    #[test]
    fn one_equal_neighbour_still_needs_a_choice() {
        let state = script(
            true,
            vec![
                ScriptElement::cue("a", 1000),
                ScriptElement::cue("b", 1000),
                ScriptElement::cue("c", 2000),
            ],
        );
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "a");
        // above is b (1000, same time), below is c (2000)
        assert_eq!(resolver.drop_at(&state, 1).unwrap(), DropOutcome::AwaitingChoice);
        assert_eq!(resolver.pending().unwrap().above.as_ref().unwrap().offset_ms, 1000);
    }

    #[test]
    fn dropping_in_place_under_auto_sort_records_nothing() {
        let state = abc(true);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "b");
        assert_eq!(resolver.drop_at(&state, 1).unwrap(), DropOutcome::Unchanged);
        assert_eq!(resolver.state(), &DragState::Idle);
    }

    /// a retimed to the end: displayed b, c, a while the sequence is a, b, c.
    fn retimed_abc() -> ScriptState {
        let state = abc(true);
        let a = state.get(&ElementId::new("a")).unwrap().clone();
        let mut later = a.clone();
        later.offset_ms = 5000;
        fold::fold(&state, &[EditOperation::update_element(&a, &later).unwrap()]).unwrap()
    }

    fn displayed(state: &ScriptState) -> Vec<String> {
        state.displayed().iter().map(|e| e.element_id.to_string()).collect()
    }

    #[test]
    fn disabling_auto_sort_keeps_a_drop_made_in_time_order() {
        let state = retimed_abc();
        assert_eq!(displayed(&state), vec!["b", "c", "a"]);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");
        assert_eq!(resolver.drop_at(&state, 0).unwrap(), DropOutcome::AwaitingChoice);

        let ops = resolver.resolve(&state, Resolution::DisableAutoSort).unwrap();
        let kinds: Vec<&str> = ops.iter().map(EditOperation::kind).collect();
        assert_eq!(kinds, vec!["DISABLE_AUTO_SORT", "BULK_REORDER"]);

        let after = fold::fold(&state, &ops).unwrap();
        assert!(!after.auto_sort);
        assert_eq!(displayed(&after), vec!["c", "b", "a"]);
    }

    #[test]
    fn retiming_resolution_keeps_a_drop_made_in_time_order() {
        let state = retimed_abc();
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");
        resolver.drop_at(&state, 0).unwrap();

        let ops = resolver.resolve(&state, Resolution::MatchBelow).unwrap();
        let after = fold::fold(&state, &ops).unwrap();
        assert_eq!(after.get(&ElementId::new("c")).unwrap().offset_ms, 1000);
        assert_eq!(ids(&after), vec!["c", "b", "a"]);
        assert_eq!(displayed(&after), vec!["c", "b", "a"]);
    }

    #[test]
    fn matching_the_neighbour_above_retimes_after_reorder() {
        let state = abc(true);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");
        resolver.drop_at(&state, 1).unwrap();

        let ops = resolver.resolve(&state, Resolution::MatchAbove).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].kind(), "REORDER");
        assert_eq!(ops[1].kind(), "UPDATE_ELEMENT");

        let after = fold::fold(&state, &ops).unwrap();
        assert_eq!(after.get(&ElementId::new("c")).unwrap().offset_ms, 0);
        let displayed: Vec<String> =
            after.displayed().iter().map(|e| e.element_id.to_string()).collect();
        assert_eq!(displayed, vec!["a", "c", "b"]);
    }

    #[test]
    fn disabling_auto_sort_keeps_the_drop_position() {
        let state = abc(true);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");
        resolver.drop_at(&state, 1).unwrap();

        let ops = resolver.resolve(&state, Resolution::DisableAutoSort).unwrap();
        let after = fold::fold(&state, &ops).unwrap();
        assert!(!after.auto_sort);
        assert_eq!(ids(&after), vec!["a", "c", "b"]);
        assert_eq!(after.get(&ElementId::new("c")).unwrap().offset_ms, 2000);
    }

    #[test]
    fn custom_offset_and_cancel() {
        let state = abc(true);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "c");
        resolver.drop_at(&state, 1).unwrap();
        let ops = resolver.resolve(&state, Resolution::CustomOffset(500)).unwrap();
        let after = fold::fold(&state, &ops).unwrap();
        assert_eq!(after.get(&ElementId::new("c")).unwrap().offset_ms, 500);

        start_drag(&mut resolver, &state, "c");
        resolver.drop_at(&state, 1).unwrap();
        resolver.cancel();
        assert_eq!(resolver.state(), &DragState::Idle);
        assert!(resolver.resolve(&state, Resolution::MatchBelow).is_err());
    }

    #[test]
    fn missing_neighbour_keeps_conflict_pending() {
        let state = abc(true);
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "a");
        // dropped last: nothing below, and c (2000) above is later than a (0)
        assert_eq!(resolver.drop_at(&state, 2).unwrap(), DropOutcome::AwaitingChoice);
        assert!(resolver.resolve(&state, Resolution::MatchBelow).is_err());
        assert!(resolver.pending().is_some());
    }

    #[test]
    fn dragging_a_group_moves_its_children() {
        let state = script(
            false,
            vec![
                ScriptElement::cue("a", 0),
                ScriptElement::group("g", 100),
                ScriptElement::cue("g1", 100).with_parent("g", 1),
                ScriptElement::cue("g2", 200).with_parent("g", 1),
                ScriptElement::cue("z", 300),
            ],
        );
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "g");
        assert_eq!(resolver.draggable().unwrap().len(), 3);

        let DropOutcome::Commit(ops) = resolver.drop_at(&state, 2).unwrap() else {
            panic!("expected a direct commit");
        };
        assert_eq!(ops[0].kind(), "BULK_REORDER");
        let after = fold::fold(&state, &ops).unwrap();
        assert_eq!(ids(&after), vec!["a", "z", "g", "g1", "g2"]);
    }

    #[test]
    fn collapsed_children_stay_with_their_group() {
        let state = script(
            false,
            vec![
                ScriptElement::group("g", 0).collapsed(true),
                ScriptElement::cue("hidden", 0).with_parent("g", 1),
                ScriptElement::cue("x", 10),
                ScriptElement::cue("y", 20),
            ],
        );
        let mut resolver = ReorderResolver::new(DEBOUNCE);
        start_drag(&mut resolver, &state, "y");
        let DropOutcome::Commit(ops) = resolver.drop_at(&state, 1).unwrap() else {
            panic!("expected a direct commit");
        };
        let after = fold::fold(&state, &ops).unwrap();
        assert_eq!(ids(&after), vec!["g", "hidden", "y", "x"]);
    }
}
