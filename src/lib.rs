//! georange - IPv4 range index for GeoIP city data
//!
//! georange ingests a city-level geolocation dataset (IPv4 ranges, locations,
//! regions and countries) and builds an index that maps any IPv4 address to
//! the range containing it and that range's coordinates and postal code.
//!
//! # Quick Start
//!
//! ```rust
//! use georange::{MemoryStore, RangeIndex, RangeRecord};
//!
//! let index = RangeIndex::new(MemoryStore::new());
//! index.insert(&RangeRecord::new(16_777_216, 16_777_471, -27.0, 133.0, ""))?;
//!
//! let hit = index.lookup_str("1.0.0.42")?.expect("inside the range");
//! assert_eq!(hit.latitude, -27.0);
//! assert!(index.lookup_str("1.0.1.0")?.is_none());
//! # Ok::<(), georange::GeoRangeError>(())
//! ```
//!
//! Importing a full dataset into a persistent store:
//!
//! ```rust,no_run
//! use georange::{run_import, FileStore, ImportConfig, RangeIndex};
//!
//! let index = RangeIndex::new(FileStore::open("geo/ranges.log")?);
//! let config = ImportConfig::from_blocks_path("geo/GeoLiteCity-Blocks.csv").with_reset(true);
//! let report = run_import(&config, &index)?;
//! println!("{} ranges processed", report.load.processed);
//! # Ok::<(), georange::GeoRangeError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ countries.csv │   │ regions.csv  │   │ locations.csv│
//! └──────┬────────┘   └──────┬───────┘   └──────┬───────┘
//!        └──────────► reference tables ◄────────┘
//!                            │ location id → joined record
//! ┌──────────────┐   ┌───────▼───────┐   ┌──────────────────────┐
//! │ blocks.csv   ├──►│  BulkLoader   ├──►│ RangeIndex           │
//! └──────────────┘   │ batched writes│   │ boundaries + payloads│
//!                    └───────────────┘   └──────────┬───────────┘
//!                                                   │
//!                                        ┌──────────▼───────────┐
//!                                        │ OrderedStore         │
//!                                        │ (memory / file log)  │
//!                                        └──────────────────────┘
//! ```
//!
//! Lookups are a floor query on the boundary index plus one payload read:
//! O(log n) in the number of ranges.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod import;
pub mod loader;
pub mod range_index;
pub mod range_record;
pub mod reference;
pub mod sources;
pub mod store;

pub use crate::config::ImportConfig;
pub use crate::error::{GeoRangeError, Result, RowError};
pub use crate::import::{run_import, ImportReport, ReferenceTables};
pub use crate::loader::{BulkLoader, LoadReport, RowOutcome, DEFAULT_BATCH_SIZE};
pub use crate::range_index::RangeIndex;
pub use crate::range_record::{RangeRecord, RangeRow};
pub use crate::reference::{
    CountryRecord, CountryTable, LocationRecord, LocationTable, RegionTable, Resolved,
};
pub use crate::store::{FileStore, MemoryStore, OrderedStore, WriteBatch};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
