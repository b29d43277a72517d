use std::path::Path;

use anyhow::{Context, Result};

use crate::db::{CollectionLayout, TriageDb};

/// Open the classification database, defaulting to the collection's own `triage.db`.
pub fn open_triage_db(layout: &CollectionLayout, explicit: Option<&Path>) -> Result<TriageDb> {
    let db_path = explicit.unwrap_or(&layout.db_path);
    TriageDb::open(db_path)
        .with_context(|| format!("Failed to open triage database at {}", db_path.display()))
}
