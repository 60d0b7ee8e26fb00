//! Dump a script from the persistence service for inspection.
//!
//! Usage: cargo run --bin dump_script -- <script-id> [--json]

use showflow::config::Config;
use showflow::persistence::{ApiClient, ScriptStore};
use showflow::script::display::format_offset;
use showflow::types::ScriptId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let Some(script_id) = args.iter().find(|a| !a.starts_with("--")) else {
        anyhow::bail!("usage: dump_script <script-id> [--json]");
    };

    let config = Config::load()?;
    let client = ApiClient::new(&config);
    let script = client.load_script(&ScriptId::new(script_id.as_str())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&script)?);
        return Ok(());
    }

    println!(
        "=== {} ({:?}, {} elements, auto-sort {}) ===",
        script.info.script_name,
        script.info.script_status,
        script.elements.len(),
        if script.auto_sort { "on" } else { "off" }
    );
    if let Some(venue) = &script.info.venue {
        println!("Venue: {venue}");
    }

    for element in &script.to_state().elements {
        let parent = element
            .parent_element_id
            .as_ref()
            .map(|p| format!(" (in {p})"))
            .unwrap_or_default();
        let dept = element
            .department_id
            .as_ref()
            .map(|d| format!(" [{d}]"))
            .unwrap_or_default();
        println!(
            "  {:>3}. {:>11} {:<5} {:<8} {}{dept}{parent} {:?}",
            element.sequence,
            format_offset(element.offset_ms),
            element.element_type.name(),
            element.cue_id.as_deref().unwrap_or("-"),
            element.element_name,
            element.priority,
        );
        if let Some(notes) = element.cue_notes.as_deref().filter(|n| !n.is_empty()) {
            println!("        note: {notes}");
        }
    }
    Ok(())
}
