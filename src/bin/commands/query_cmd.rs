use anyhow::{Context, Result};
use georange::{FileStore, RangeIndex};
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::record_to_json;

pub fn cmd_query(store: PathBuf, query: String, quiet: bool) -> Result<()> {
    let store = FileStore::open_read_only(&store)
        .with_context(|| format!("Failed to open store: {}", store.display()))?;
    let index = RangeIndex::new(store);

    let result = index
        .lookup_str(&query)
        .with_context(|| format!("Query failed for: {}", query))?;
    let found = result.is_some();

    if !quiet {
        // Always an array, empty when nothing matched
        let results: Vec<_> = result.iter().map(record_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&json!(results))?);
    }

    std::process::exit(if found { 0 } else { 1 });
}
