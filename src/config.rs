//! Import configuration
//!
//! Only the blocks file is mandatory. The three reference files default to
//! their conventional names in the same directory as the blocks file.

use crate::loader::DEFAULT_BATCH_SIZE;
use std::path::{Path, PathBuf};

/// Default name of the locations file
pub const DEFAULT_LOCATIONS_FILE: &str = "GeoLiteCity-Location.csv";

/// Default name of the regions file
pub const DEFAULT_REGIONS_FILE: &str = "regions.csv";

/// Default name of the countries file
pub const DEFAULT_COUNTRIES_FILE: &str = "countries.csv";

/// Everything one import run needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    /// Range (blocks) file
    pub blocks: PathBuf,
    /// Locations file
    pub locations: PathBuf,
    /// Regions file
    pub regions: PathBuf,
    /// Countries file
    pub countries: PathBuf,
    /// Drop the boundary index before loading
    pub reset: bool,
    /// Rows per commit
    pub batch_size: usize,
}

impl ImportConfig {
    /// Config for `blocks`, with reference files next to it
    ///
    /// # Example
    /// ```
    /// use georange::ImportConfig;
    /// use std::path::Path;
    ///
    /// let config = ImportConfig::from_blocks_path("/data/GeoLiteCity-Blocks.csv");
    /// assert_eq!(config.regions, Path::new("/data/regions.csv"));
    /// assert!(!config.reset);
    /// ```
    pub fn from_blocks_path(blocks: impl Into<PathBuf>) -> Self {
        let blocks = blocks.into();
        let dir = blocks.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        Self {
            locations: dir.join(DEFAULT_LOCATIONS_FILE),
            regions: dir.join(DEFAULT_REGIONS_FILE),
            countries: dir.join(DEFAULT_COUNTRIES_FILE),
            blocks,
            reset: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Use a specific locations file
    pub fn with_locations(mut self, path: impl Into<PathBuf>) -> Self {
        self.locations = path.into();
        self
    }

    /// Use a specific regions file
    pub fn with_regions(mut self, path: impl Into<PathBuf>) -> Self {
        self.regions = path.into();
        self
    }

    /// Use a specific countries file
    pub fn with_countries(mut self, path: impl Into<PathBuf>) -> Self {
        self.countries = path.into();
        self
    }

    /// Drop the boundary index before loading
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Rows per commit (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_blocks_dir() {
        let config = ImportConfig::from_blocks_path("/data/geo/GeoLiteCity-Blocks.csv");
        assert_eq!(
            config.locations,
            Path::new("/data/geo/GeoLiteCity-Location.csv")
        );
        assert_eq!(config.countries, Path::new("/data/geo/countries.csv"));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_bare_file_name_uses_current_dir() {
        let config = ImportConfig::from_blocks_path("blocks.csv");
        assert_eq!(config.regions, Path::new("regions.csv"));
    }

    #[test]
    fn test_overrides() {
        let config = ImportConfig::from_blocks_path("/a/blocks.csv")
            .with_countries("/b/c.csv")
            .with_reset(true)
            .with_batch_size(0);
        assert_eq!(config.countries, Path::new("/b/c.csv"));
        assert_eq!(config.regions, Path::new("/a/regions.csv"));
        assert!(config.reset);
        assert_eq!(config.batch_size, 1);
    }
}
