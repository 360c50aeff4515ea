//! One import run, end to end
//!
//! 1. Build the country, region and location tables. Any failure here, or
//!    an empty table, stops the run before the index is touched.
//! 2. Open the blocks file.
//! 3. Drop the boundary index if a reset was requested.
//! 4. Stream the blocks file through the [`BulkLoader`].

use crate::config::ImportConfig;
use crate::error::{GeoRangeError, Result};
use crate::loader::{BulkLoader, LoadReport};
use crate::range_index::RangeIndex;
use crate::reference::{CountryTable, LocationTable, RegionTable};
use crate::sources;
use crate::store::OrderedStore;
use log::info;
use std::time::Instant;

/// The three joined reference tables of one run
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    /// Countries by ISO-2 code
    pub countries: CountryTable,
    /// Regions by country and region code
    pub regions: RegionTable,
    /// Locations by id, already joined
    pub locations: LocationTable,
}

impl ReferenceTables {
    /// Read and join the reference files named in `config`
    pub fn load(config: &ImportConfig) -> Result<Self> {
        info!("Building country table from {}", config.countries.display());
        let countries = CountryTable::build(sources::read_countries(&config.countries)?);
        if countries.is_empty() {
            return Err(GeoRangeError::EmptyTable("country"));
        }

        info!("Building region table from {}", config.regions.display());
        let regions = RegionTable::build(sources::read_regions(&config.regions)?);
        if regions.is_empty() {
            return Err(GeoRangeError::EmptyTable("region"));
        }

        info!("Building location table from {}", config.locations.display());
        let locations =
            LocationTable::build(sources::read_locations(&config.locations)?, &countries, &regions);
        if locations.is_empty() {
            return Err(GeoRangeError::EmptyTable("location"));
        }

        Ok(Self {
            countries,
            regions,
            locations,
        })
    }
}

/// Outcome of [`run_import`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Countries loaded
    pub countries: usize,
    /// Regions loaded
    pub regions: usize,
    /// Locations loaded
    pub locations: usize,
    /// Whether an existing boundary index was dropped
    pub reset: bool,
    /// Loader counters
    pub load: LoadReport,
    /// Boundaries in the index after the run
    pub indexed: usize,
}

/// Rebuild `index` from the files in `config`
pub fn run_import<S: OrderedStore>(
    config: &ImportConfig,
    index: &RangeIndex<S>,
) -> Result<ImportReport> {
    let started = Instant::now();
    let tables = ReferenceTables::load(config)?;

    let mut rows = sources::open_ranges(&config.blocks)?;

    let reset = if config.reset {
        info!("Deleting old ip data");
        index.reset()?
    } else {
        false
    };

    info!("Starting import of {}", config.blocks.display());
    let load = BulkLoader::new(index, &tables.locations)
        .with_batch_size(config.batch_size)
        .load(&mut rows)?;
    rows.finish()?;

    let indexed = index.len()?;
    info!(
        "Import finished in {:.2?}: {} ranges processed, {} in index",
        started.elapsed(),
        load.processed,
        indexed
    );

    Ok(ImportReport {
        countries: tables.countries.len(),
        regions: tables.regions.len(),
        locations: tables.locations.len(),
        reset,
        load,
        indexed,
    })
}
