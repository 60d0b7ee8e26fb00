//! `ShowFlow` - inspect and push local script edit sessions.
//!
//! Usage:
//!   showflow pull <script-id> [draft]
//!   showflow show <draft>
//!   showflow history <draft>
//!   showflow undo|redo|discard <draft>
//!   showflow push <draft>
//!
//! `<draft>` is a path to a draft file or a bare script id, which resolves
//! into `SHOWFLOW_DRAFT_DIR`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use showflow::config::Config;
use showflow::persistence::{draft, ApiClient, ScriptStore, SessionDraft};
use showflow::queue::EditQueue;
use showflow::script::display::format_offset;
use showflow::services::save::{shared, SaveController};
use showflow::types::ScriptId;

const USAGE: &str = "usage: showflow <pull|show|history|undo|redo|discard|push> <args>";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::load()?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["pull", script_id] => pull(&config, script_id, None).await,
        ["pull", script_id, path] => pull(&config, script_id, Some(*path)).await,
        ["show", path] => show(&draft::resolve(&config, path)?),
        ["history", path] => history(&draft::resolve(&config, path)?),
        ["undo", path] => step(&draft::resolve(&config, path)?, EditQueue::undo, "undo"),
        ["redo", path] => step(&draft::resolve(&config, path)?, EditQueue::redo, "redo"),
        ["discard", path] => discard(&draft::resolve(&config, path)?),
        ["push", path] => push(&config, &draft::resolve(&config, path)?).await,
        _ => bail!(USAGE),
    }
}

fn api_store(config: &Config) -> Result<Arc<dyn ScriptStore>> {
    if !config.has_api_credentials() {
        bail!("Set SHOWFLOW_API_URL and SHOWFLOW_API_TOKEN to reach the script service");
    }
    Ok(Arc::new(ApiClient::new(config)))
}

async fn pull(config: &Config, script_id: &str, path: Option<&str>) -> Result<()> {
    let script_id = ScriptId::new(script_id);
    let path = match path {
        Some(p) => PathBuf::from(p),
        None => draft::resolve(config, script_id.as_str())?,
    };
    if path.exists() {
        let existing = SessionDraft::load(&path)?;
        if existing.queue.current_index > 0 {
            bail!(
                "{} has {} unsaved edits; push or discard them first",
                path.display(),
                existing.queue.current_index
            );
        }
    }

    let script = api_store(config)?.load_script(&script_id).await?;
    let queue = EditQueue::new(script.to_state());
    SessionDraft::capture(script_id, &queue).save(&path)?;
    println!("Pulled {} elements into {}", queue.all_elements().len(), path.display());
    Ok(())
}

fn show(path: &Path) -> Result<()> {
    let draft = SessionDraft::load(path)?;
    let queue = draft.to_queue();
    let state = queue.current_state();

    println!(
        "{} [{}] auto-sort: {}",
        state.info.script_name,
        draft.script_id,
        if state.auto_sort { "on" } else { "off" }
    );
    for element in queue.elements() {
        let indent = "  ".repeat(element.group_level as usize);
        let marker = match (element.is_group(), element.is_collapsed) {
            (true, true) => "+",
            (true, false) => "-",
            (false, _) => " ",
        };
        println!(
            "{:>4} {:>11} {marker} {indent}{:<8} {}",
            element.sequence,
            format_offset(element.offset_ms),
            element.cue_id.as_deref().unwrap_or(element.element_type.name()),
            element.element_name,
        );
    }
    println!(
        "\n{} unsaved edit(s), {} undone, {} checkpoint(s)",
        queue.current_index(),
        queue.operations().len() - queue.current_index(),
        queue.checkpoints().len()
    );
    Ok(())
}

fn history(path: &Path) -> Result<()> {
    let queue = SessionDraft::load(path)?.to_queue();
    if queue.operations().is_empty() {
        println!("No edits");
        return Ok(());
    }
    for entry in queue.history() {
        for cp in queue.checkpoints().iter().filter(|c| c.operation_index == entry.index) {
            println!("     -- checkpoint: {} ({:?})", cp.description, cp.checkpoint_type);
        }
        let mark = if entry.applied { " " } else { "~" };
        println!(
            "{mark}{:>3}  {}  {:<30} {}",
            entry.index + 1,
            entry.timestamp.format("%H:%M:%S"),
            entry.kind,
            entry.description
        );
    }
    Ok(())
}

fn step(path: &Path, action: fn(&mut EditQueue) -> bool, name: &str) -> Result<()> {
    let mut draft = SessionDraft::load(path)?;
    let mut queue = draft.to_queue();
    if !action(&mut queue) {
        bail!("Nothing to {name}");
    }
    draft = SessionDraft::capture(draft.script_id, &queue);
    draft.save(path)?;
    println!("{name}: {} of {} edits applied", queue.current_index(), queue.operations().len());
    Ok(())
}

fn discard(path: &Path) -> Result<()> {
    let draft = SessionDraft::load(path)?;
    let mut queue = draft.to_queue();
    queue.discard_changes();
    SessionDraft::capture(draft.script_id, &queue).save(path)?;
    println!("Discarded local edits in {}", path.display());
    Ok(())
}

async fn push(config: &Config, path: &Path) -> Result<()> {
    let draft = SessionDraft::load(path)?;
    let controller = SaveController::new(api_store(config)?, draft.script_id.clone());
    let queue = shared(draft.to_queue());

    let saved = controller
        .save_changes(&queue)
        .await
        .with_context(|| format!("Pushing {} failed; the draft is unchanged", path.display()))?;
    if !saved {
        println!("Nothing to push");
        return Ok(());
    }

    let queue = queue.lock().await;
    SessionDraft::capture(draft.script_id, &queue).save(path)?;
    println!("Pushed; server now has {} elements", queue.server_state().len());
    Ok(())
}
