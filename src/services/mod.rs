//! Service modules built on top of the edit queue.
//!
//! These turn user gestures into operations and move batches between a
//! session and the persistence service.

/// Group operation builders
pub mod grouping;
/// Drag-to-reorder state machine
pub mod reorder;
/// Save controller and auto-save
pub mod save;

pub use reorder::{DragState, DropOutcome, ReorderResolver, Resolution};
pub use save::{SaveController, SharedQueue};
