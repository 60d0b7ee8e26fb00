//! Persistence boundary.
//!
//! The edit queue never talks to the network itself. Loading a script and
//! saving a batch of edits go through a [`ScriptStore`], implemented over
//! HTTP by [`ApiClient`] and in process by [`MemoryStore`]. Local session
//! drafts live in [`draft`].

/// HTTP client for the persistence service
pub mod api;
/// Local session drafts
pub mod draft;
/// In-process store
pub mod memory;

pub use api::ApiClient;
pub use draft::SessionDraft;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::queue::{EditOperation, SaveBatch};
use crate::script::{ScriptElement, ScriptInfo, ScriptState};
use crate::types::ScriptId;

/// A script as the server returns it when a session opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerScript {
    /// Server-side id.
    pub script_id: ScriptId,
    /// Header fields.
    #[serde(flatten)]
    pub info: ScriptInfo,
    /// Auto-sort preference.
    #[serde(default)]
    pub auto_sort: bool,
    /// Elements in sequence order.
    #[serde(default)]
    pub elements: Vec<ScriptElement>,
}

impl ServerScript {
    /// Builds the baseline an edit session folds onto.
    pub fn to_state(&self) -> ScriptState {
        ScriptState::new(self.info.clone(), self.auto_sort, self.elements.clone())
    }
}

/// The single batch-save request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// The full folded element list.
    pub elements: Vec<ScriptElement>,
    /// The applied operations, for the server's audit trail.
    pub operations: Vec<EditOperation>,
}

impl From<&SaveBatch> for SaveRequest {
    fn from(batch: &SaveBatch) -> Self {
        Self {
            elements: batch.state.elements.clone(),
            operations: batch.operations.clone(),
        }
    }
}

/// Where scripts are loaded from and saved to.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Fetches a script to start an edit session.
    async fn load_script(&self, script_id: &ScriptId) -> Result<ServerScript>;

    /// Persists one batch and returns the canonical element list.
    async fn save_batch(&self, script_id: &ScriptId, request: &SaveRequest)
        -> Result<Vec<ScriptElement>>;
}
