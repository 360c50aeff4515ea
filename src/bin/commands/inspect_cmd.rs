use anyhow::{Context, Result};
use georange::range_index::RECORD_PREFIX;
use georange::{FileStore, OrderedStore, RangeIndex};
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, record_to_json};

pub fn cmd_inspect(store_path: PathBuf, json_output: bool) -> Result<()> {
    let store = FileStore::open_read_only(&store_path)
        .with_context(|| format!("Failed to open store: {}", store_path.display()))?;
    let log_size = store.log_size()?;
    let index = RangeIndex::new(store);

    let ranges = index.len()?;
    let first = index.first()?;
    let last = index.last()?;
    let records = index.store().keys(RECORD_PREFIX)?.len();

    if json_output {
        let output = json!({
            "store": store_path.display().to_string(),
            "log_bytes": log_size,
            "ranges": ranges,
            "records": records,
            "first": first.as_ref().map(record_to_json),
            "last": last.as_ref().map(record_to_json),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Store:    {}", store_path.display());
    println!("Log size: {}", format_bytes(log_size));
    println!();
    println!("Ranges:   {}", ranges);
    if records > ranges {
        println!(
            "Records:  {} ({} unreachable, run `georange compact` to drop them)",
            records,
            records - ranges
        );
    } else {
        println!("Records:  {}", records);
    }
    match (first, last) {
        (Some(first), Some(last)) => {
            println!("First:    {}", first);
            println!("Last:     {}", last);
        }
        _ => println!("Index is empty"),
    }

    Ok(())
}
