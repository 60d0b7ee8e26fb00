//! Local session drafts.
//!
//! A draft is the whole client-side session written to disk as JSON: the
//! server baseline plus the operation log, cursor and checkpoints. Loading it
//! back yields an identical queue.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::constants::save::DRAFT_EXTENSION;
use crate::error::{Error, Result};
use crate::queue::{EditQueue, EditQueueState};
use crate::script::ScriptState;
use crate::types::ScriptId;

/// A saved edit session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    /// Script the session edits.
    pub script_id: ScriptId,
    /// When the draft was written.
    pub saved_at: DateTime<Utc>,
    /// Server baseline the log folds onto.
    pub baseline: ScriptState,
    /// Log, cursor and checkpoints.
    pub queue: EditQueueState,
}

impl SessionDraft {
    /// Captures a queue.
    pub fn capture(script_id: ScriptId, queue: &EditQueue) -> Self {
        Self {
            script_id,
            saved_at: Utc::now(),
            baseline: queue.server_state().clone(),
            queue: queue.state().clone(),
        }
    }

    /// Reopens the session.
    pub fn to_queue(&self) -> EditQueue {
        EditQueue::from_parts(self.baseline.clone(), self.queue.clone())
    }

    /// Writes the draft as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent).map_err(|e| Error::io(e, parent.to_path_buf()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs_err::write(path, json).map_err(|e| Error::io(e, path.to_path_buf()))?;
        tracing::debug!(
            path = %path.display(),
            operations = self.queue.operations.len(),
            "Saved session draft"
        );
        Ok(())
    }

    /// Reads a draft.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs_err::read_to_string(path).map_err(|e| Error::io(e, path.to_path_buf()))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::parse(format!("Invalid session draft: {e}"), path.to_path_buf()))
    }
}

/// Where the draft for `script_id` lives under `dir`.
pub fn draft_path(dir: &Path, script_id: &ScriptId) -> PathBuf {
    dir.join(script_id.as_str()).with_extension(DRAFT_EXTENSION)
}

/// Resolves a CLI argument to a draft file.
///
/// Anything that looks like a path is used as-is; a bare script id maps to
/// its file in the configured draft directory.
pub fn resolve(config: &Config, arg: &str) -> Result<PathBuf> {
    let candidate = PathBuf::from(arg);
    let looks_like_path = candidate.components().count() > 1
        || candidate.extension().is_some()
        || candidate.exists();
    if looks_like_path {
        return Ok(candidate);
    }
    let dir = config.draft_dir.as_ref().ok_or_else(|| {
        Error::config(
            "No draft directory available",
            "Set SHOWFLOW_DRAFT_DIR or pass a path to the draft file",
        )
    })?;
    Ok(draft_path(dir, &ScriptId::new(arg)))
}
