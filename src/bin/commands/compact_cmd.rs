use anyhow::{ensure, Context, Result};
use georange::{FileStore, RangeIndex};
use std::path::PathBuf;

use crate::cli_utils::format_bytes;

pub fn cmd_compact(store_path: PathBuf) -> Result<()> {
    ensure!(store_path.exists(), "Store not found: {}", store_path.display());
    let store = FileStore::open(&store_path)
        .with_context(|| format!("Failed to open store: {}", store_path.display()))?;
    let before = store.log_size()?;
    let index = RangeIndex::new(store);

    let pruned = index.prune_orphans()?;
    index
        .store()
        .compact()
        .with_context(|| format!("Failed to compact store: {}", store_path.display()))?;
    let after = index.store().log_size()?;

    println!("Pruned {} unreachable records", pruned);
    println!("Log size: {} -> {}", format_bytes(before), format_bytes(after));
    Ok(())
}
