//! `ShowFlow` - local edit queue for live-show production scripts.
//!
//! A stage manager edits a script (reorder, retime, group, delete, toggle
//! auto-sort, collapse groups) entirely client-side, with undo/redo and named
//! checkpoints, and persists the result as one batch.

// Re-export public modules for use in integration tests and as a library
pub mod config;
pub mod constants;
pub mod error;
pub mod persistence;
pub mod queue;
pub mod script;
pub mod services;
pub mod types;
