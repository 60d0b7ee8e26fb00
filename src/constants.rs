//! Application constants.
//!
//! Centralizes magic numbers and configuration defaults.

/// Drag-to-reorder constants.
pub mod drag {
    /// Hold time before a press becomes a drag instead of a click-to-select.
    pub const DEBOUNCE_MS: u64 = 80;
}

/// Persistence service constants.
pub mod api {
    /// Request timeout for the persistence service.
    pub const TIMEOUT_SECS: u64 = 30;

    /// Base URL used when `SHOWFLOW_API_URL` is unset.
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
}

/// Saving and drafts.
pub mod save {
    /// Shortest auto-save interval accepted from configuration.
    pub const MIN_AUTO_SAVE_SECS: u64 = 5;

    /// Directory name under the platform data dir for session drafts.
    pub const DRAFT_DIR_NAME: &str = "showflow/drafts";

    /// File extension of session drafts.
    pub const DRAFT_EXTENSION: &str = "json";
}
