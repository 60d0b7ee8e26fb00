//! Saving the edit queue.
//!
//! The controller is the only path from a session to the persistence
//! service. It takes a batch under a short lock, awaits the store without
//! holding the lock so editing can continue, then reconciles the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::persistence::{SaveRequest, ScriptStore};
use crate::queue::EditQueue;
use crate::types::ScriptId;

/// An edit queue shared between the editing surface and the saver.
pub type SharedQueue = Arc<Mutex<EditQueue>>;

/// Wraps a queue for sharing.
pub fn shared(queue: EditQueue) -> SharedQueue {
    Arc::new(Mutex::new(queue))
}

/// Saves one script's queue through a [`ScriptStore`].
pub struct SaveController {
    store: Arc<dyn ScriptStore>,
    script_id: ScriptId,
}

impl SaveController {
    /// Creates a controller for one script.
    pub fn new(store: Arc<dyn ScriptStore>, script_id: ScriptId) -> Self {
        Self { store, script_id }
    }

    /// The script this controller saves.
    pub const fn script_id(&self) -> &ScriptId {
        &self.script_id
    }

    /// Loads the script and opens an empty edit session on it.
    pub async fn open(&self) -> Result<SharedQueue> {
        let script = self.store.load_script(&self.script_id).await?;
        Ok(shared(EditQueue::new(script.to_state())))
    }

    /// Sends the applied operations as one batch.
    ///
    /// Returns `Ok(false)` when there was nothing to save. On failure the
    /// queue is left as it was and the error is returned; edits made while
    /// the request was running are never part of it.
    ///
    /// The request and the reconcile run on their own task, so dropping
    /// this future (a timeout, an aborted auto-save) still settles the
    /// queue once the store answers.
    pub async fn save_changes(&self, queue: &SharedQueue) -> Result<bool> {
        let batch = {
            let mut q = queue.lock().await;
            match q.prepare_save()? {
                Some(batch) => batch,
                None => return Ok(false),
            }
        };

        tracing::debug!(
            script = %self.script_id,
            operations = batch.operations.len(),
            "Saving edit batch"
        );
        let store = Arc::clone(&self.store);
        let script_id = self.script_id.clone();
        let task_queue = Arc::clone(queue);
        let request = tokio::spawn(async move {
            let result = store.save_batch(&script_id, &SaveRequest::from(&batch)).await;
            let mut q = task_queue.lock().await;
            match result {
                Ok(saved) => {
                    q.complete_save(&batch, saved);
                    drop(q);
                    Ok(true)
                }
                Err(e) => {
                    q.abort_save();
                    drop(q);
                    tracing::warn!(script = %script_id, "Save failed, keeping local edits: {e}");
                    Err(e)
                }
            }
        });

        match request.await {
            Ok(result) => result,
            Err(e) => {
                queue.lock().await.abort_save();
                Err(Error::save(format!("Save task ended early: {e}")))
            }
        }
    }

    /// Reloads the script from the server and drops every local edit.
    pub async fn revert_to_server(&self, queue: &SharedQueue) -> Result<()> {
        let script = self.store.load_script(&self.script_id).await?;
        let mut q = queue.lock().await;
        q.update_server_elements(script.elements);
        q.discard_changes();
        Ok(())
    }

    /// Saves on a fixed interval until the returned task is aborted.
    ///
    /// Ticks are skipped while nothing is pending or a save is already
    /// running; failures are logged and retried on the next tick.
    pub fn spawn_auto_save(self: Arc<Self>, queue: SharedQueue, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                {
                    let q = queue.lock().await;
                    if !q.has_unsaved_changes() || q.is_saving() {
                        continue;
                    }
                }
                match self.save_changes(&queue).await {
                    Ok(_) => {}
                    Err(Error::SaveInProgress) => {
                        tracing::debug!("Auto-save skipped: a save is already running");
                    }
                    Err(e) => tracing::warn!("Auto-save failed: {e}"),
                }
            }
        })
    }
}
