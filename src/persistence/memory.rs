//! In-process script store.
//!
//! Behaves like the persistence service: it assigns dense sequences on save
//! and applies the script-level operations in the audit trail. Failures and
//! latency can be injected for exercising the save path.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{SaveRequest, ScriptStore, ServerScript};
use crate::error::{Error, Result};
use crate::queue::EditChange;
use crate::script::ScriptElement;
use crate::types::ScriptId;

/// A [`ScriptStore`] backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    scripts: Mutex<HashMap<ScriptId, ServerScript>>,
    failures: Mutex<VecDeque<Error>>,
    last_request: Mutex<Option<SaveRequest>>,
    save_delay: Option<Duration>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed a script.
    #[must_use]
    pub fn with_script(mut self, script: ServerScript) -> Self {
        self.scripts.get_mut().insert(script.script_id.clone(), script);
        self
    }

    /// Builder: make every save wait before answering.
    #[must_use]
    pub const fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = Some(delay);
        self
    }

    /// Makes the next save fail with `error`; queued errors are used in order.
    pub async fn fail_next_save(&self, error: Error) {
        self.failures.lock().await.push_back(error);
    }

    /// The script as currently stored.
    pub async fn script(&self, script_id: &ScriptId) -> Option<ServerScript> {
        self.scripts.lock().await.get(script_id).cloned()
    }

    /// The body of the last save attempt that reached the store.
    pub async fn last_request(&self) -> Option<SaveRequest> {
        self.last_request.lock().await.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

fn not_found(script_id: &ScriptId) -> Error {
    Error::save_status(format!("Script {script_id} not found"), 404)
}

#[async_trait]
impl ScriptStore for MemoryStore {
    async fn load_script(&self, script_id: &ScriptId) -> Result<ServerScript> {
        self.script(script_id).await.ok_or_else(|| not_found(script_id))
    }

    async fn save_batch(
        &self,
        script_id: &ScriptId,
        request: &SaveRequest,
    ) -> Result<Vec<ScriptElement>> {
        if let Some(delay) = self.save_delay {
            tokio::time::sleep(delay).await;
        }
        *self.last_request.lock().await = Some(request.clone());
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut scripts = self.scripts.lock().await;
        let script = scripts.get_mut(script_id).ok_or_else(|| not_found(script_id))?;

        for op in &request.operations {
            match &op.change {
                EditChange::UpdateScriptInfo { changes } => {
                    for change in changes {
                        change.apply(&mut script.info);
                    }
                }
                EditChange::EnableAutoSort { .. } => script.auto_sort = true,
                EditChange::DisableAutoSort { .. } => script.auto_sort = false,
                _ => {}
            }
        }

        let mut elements = request.elements.clone();
        elements.sort_by_key(|e| e.sequence);
        for (element, sequence) in elements.iter_mut().zip(1u32..) {
            element.sequence = sequence;
        }
        script.elements.clone_from(&elements);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::queue::EditOperation;
    use crate::script::{ScriptInfo, ScriptStatus};

    fn seeded() -> MemoryStore {
        MemoryStore::new().with_script(ServerScript {
            script_id: ScriptId::new("s1"),
            info: ScriptInfo::new("Hamlet"),
            auto_sort: false,
            elements: vec![ScriptElement::cue("a", 0).with_sequence(1)],
        })
    }

    #[tokio::test]
    async fn save_assigns_dense_sequences_and_applies_script_ops() {
        let store = seeded();
        let before = ScriptInfo::new("Hamlet");
        let mut after = before.clone();
        after.script_status = ScriptStatus::Final;
        let request = SaveRequest {
            elements: vec![
                ScriptElement::cue("b", 10).with_sequence(7),
                ScriptElement::cue("a", 0).with_sequence(3),
            ],
            operations: vec![EditOperation::update_script_info(&before, &after).unwrap()],
        };

        let saved = store.save_batch(&ScriptId::new("s1"), &request).await.unwrap();
        let order: Vec<(&str, u32)> =
            saved.iter().map(|e| (e.element_id.as_str(), e.sequence)).collect();
        assert_eq!(order, vec![("a", 1), ("b", 2)]);

        let script = store.script(&ScriptId::new("s1")).await.unwrap();
        assert_eq!(script.info.script_status, ScriptStatus::Final);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn injected_failure_is_returned_once() {
        let store = seeded();
        store.fail_next_save(Error::save_status("boom", 503)).await;
        let request = SaveRequest { elements: vec![], operations: vec![] };

        let err = store.save_batch(&ScriptId::new("s1"), &request).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.save_batch(&ScriptId::new("s1"), &request).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_script_is_not_found() {
        let err = MemoryStore::new().load_script(&ScriptId::new("nope")).await.unwrap_err();
        assert!(matches!(err, Error::Save { status: Some(404), .. }));
    }
}
