use super::cache_store;
use crate::output::Output;
use color_eyre::Result;
use comfy_table::{Cell, Table};
use media_sync_config::PathManager;
use owo_colors::OwoColorize;
use serde_json::json;

pub async fn run_status(output: &Output) -> Result<()> {
    let path_manager = PathManager::default();
    let cache = cache_store(&path_manager);
    let status = cache.status().await;

    if !output.is_human() {
        output.json(&json!({
            "snapshot_dir": path_manager.snapshot_dir().display().to_string(),
            "facets": status,
        }));
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Library").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Facet").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Items").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Last activity").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("State").add_attribute(comfy_table::Attribute::Bold),
    ]);
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    for facet in &status {
        let state = if facet.known {
            "cached".green().to_string()
        } else {
            "refetch next sync".yellow().to_string()
        };
        table.add_row(vec![
            Cell::new(facet.key.kind.to_string()),
            Cell::new(facet.key.facet.to_string()),
            Cell::new(facet.items),
            Cell::new(facet.last_activity.as_ref().map(|m| m.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(state),
        ]);
    }

    output.info(format!("Snapshots: {}", path_manager.snapshot_dir().display()));
    output.info(table.to_string());
    Ok(())
}
