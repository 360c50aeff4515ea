use anyhow::{Context, Result};
use georange::{run_import, FileStore, ImportConfig, RangeIndex};
use std::path::PathBuf;

pub struct ImportArgs {
    pub blocks: PathBuf,
    pub store: PathBuf,
    pub locations: Option<PathBuf>,
    pub regions: Option<PathBuf>,
    pub countries: Option<PathBuf>,
    pub reset: bool,
    pub batch_size: usize,
}

pub fn cmd_import(args: ImportArgs) -> Result<()> {
    let mut config = ImportConfig::from_blocks_path(&args.blocks)
        .with_reset(args.reset)
        .with_batch_size(args.batch_size);
    if let Some(path) = args.locations {
        config = config.with_locations(path);
    }
    if let Some(path) = args.regions {
        config = config.with_regions(path);
    }
    if let Some(path) = args.countries {
        config = config.with_countries(path);
    }

    let store = FileStore::open(&args.store)
        .with_context(|| format!("Failed to open store: {}", args.store.display()))?;
    let index = RangeIndex::new(store);

    let report = run_import(&config, &index)
        .with_context(|| format!("Import failed for: {}", args.blocks.display()))?;

    println!("Countries:   {}", report.countries);
    println!("Regions:     {}", report.regions);
    println!("Locations:   {}", report.locations);
    println!("Processed:   {}", report.load.processed);
    println!("  inserted:  {}", report.load.inserted);
    println!("  skipped:   {}", report.load.skipped);
    println!("Junk:        {}", report.load.junk);
    println!("Commits:     {}", report.load.commits);
    println!("Indexed:     {}", report.indexed);

    Ok(())
}
