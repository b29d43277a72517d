use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use triage_core::db::{open_triage_db, CollectionLayout};

/// List classification verdicts stored in the triage database.
pub fn results_command(collection_dir: &Path, database: Option<PathBuf>, json: bool) -> Result<()> {
    let layout = CollectionLayout::new(collection_dir);
    let db = open_triage_db(&layout, database.as_deref())?;
    let rows = db.list_classifications().context("Failed to list classifications")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Classifications:");
    if rows.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for row in rows {
        println!(
            "- {} [{}] {} (hash: {}, recorded: {})",
            row.sample, row.classification, row.description, row.hash, row.recorded_at
        );
    }
    Ok(())
}
