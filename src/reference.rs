//! Reference tables joined into per-location records
//!
//! Range rows only carry a location id. Everything else a range needs is
//! looked up through three small tables that are built once per import:
//!
//! ```text
//! countries.csv ──► CountryTable ─┐
//! regions.csv   ──► RegionTable  ─┼──► LocationTable (location id → LocationRecord)
//! locations.csv ──────────────────┘
//! ```
//!
//! The join happens here, at build time, so the loader never has to chase
//! codes while it is streaming ranges. `LocationTable::build` borrows the
//! other two tables, which makes the countries → regions → locations order
//! impossible to get wrong.
//!
//! Codes missing from the country or region tables are not errors. The
//! location keeps the raw code as its display name and records that it did
//! so through [`Resolved::UsedFallback`].

use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;

/// Result of a reference lookup that degrades instead of failing
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    /// The code was present in the table
    Found(T),
    /// The code was absent; the raw code stands in as the display name
    UsedFallback(String),
}

impl<T> Resolved<T> {
    /// True when the lookup hit the table
    pub fn is_found(&self) -> bool {
        matches!(self, Resolved::Found(_))
    }

    /// The resolved value, if any
    pub fn found(&self) -> Option<&T> {
        match self {
            Resolved::Found(value) => Some(value),
            Resolved::UsedFallback(_) => None,
        }
    }

    /// Map the found value, keeping the fallback code as is
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        match self {
            Resolved::Found(value) => Resolved::Found(f(value)),
            Resolved::UsedFallback(code) => Resolved::UsedFallback(code),
        }
    }
}

/// One row of the countries source: `name, ISO-2, ISO-3, number`
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRow {
    /// Country name as written in the source (any casing)
    pub name: String,
    /// ISO 3166 alpha-2 code
    pub code: String,
    /// ISO 3166 alpha-3 code
    pub code3: String,
    /// ISO numeric code
    pub number: String,
}

/// One row of the regions source: `country code, region code, region name`
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRow {
    /// ISO-2 country code
    pub country_code: String,
    /// Region code within the country (FIPS or ISO subdivision)
    pub region_code: String,
    /// Display name
    pub region_name: String,
}

/// One row of the locations source, keyed by the header line
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocationRow {
    /// Location id referenced by range rows
    #[serde(rename = "locId")]
    pub location_id: String,
    /// ISO-2 country code, or `-` when unknown
    pub country: String,
    /// Region code
    #[serde(default)]
    pub region: String,
    /// City name
    #[serde(default)]
    pub city: String,
    /// Postal code, often empty
    #[serde(rename = "postalCode", default)]
    pub postal_code: String,
    /// Latitude as written in the source
    pub latitude: String,
    /// Longitude as written in the source
    pub longitude: String,
    /// Metro code (US only)
    #[serde(rename = "metroCode", default)]
    pub metro_code: String,
    /// Telephone area code (US only)
    #[serde(rename = "areaCode", default)]
    pub area_code: String,
}

/// A country, with its name normalized to title case
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    /// ISO-2 code (table key)
    pub code: String,
    /// Title-cased name
    pub name: String,
    /// ISO-3 code
    pub code3: String,
    /// ISO numeric code
    pub number: String,
}

/// Countries by ISO-2 code
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    by_code: HashMap<String, CountryRecord>,
}

impl CountryTable {
    /// Build the table; a repeated code replaces the earlier row
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = CountryRow>,
    {
        let mut by_code = HashMap::new();
        for row in rows {
            let record = CountryRecord {
                name: title_case(&row.name),
                code: row.code,
                code3: row.code3,
                number: row.number,
            };
            by_code.insert(record.code.clone(), record);
        }
        info!("Built country table: {} countries", by_code.len());
        Self { by_code }
    }

    /// Look up a country, falling back to the raw code
    pub fn lookup(&self, code: &str) -> Resolved<&CountryRecord> {
        match self.by_code.get(code) {
            Some(record) => Resolved::Found(record),
            None => Resolved::UsedFallback(code.to_string()),
        }
    }

    /// Exact lookup
    pub fn get(&self, code: &str) -> Option<&CountryRecord> {
        self.by_code.get(code)
    }

    /// Number of countries
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// True if no country was loaded
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Region names keyed by country code, then region code
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    by_country: HashMap<String, HashMap<String, String>>,
}

impl RegionTable {
    /// Build the two-level map; a repeated (country, region) pair replaces the earlier name
    pub fn build<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = RegionRow>,
    {
        let mut by_country: HashMap<String, HashMap<String, String>> = HashMap::new();
        for row in rows {
            by_country
                .entry(row.country_code)
                .or_default()
                .insert(row.region_code, row.region_name);
        }
        let table = Self { by_country };
        info!(
            "Built region table: {} regions across {} countries",
            table.len(),
            table.by_country.len()
        );
        table
    }

    /// Look up a region name, falling back to the region code itself
    pub fn lookup(&self, country_code: &str, region_code: &str) -> Resolved<&str> {
        match self
            .by_country
            .get(country_code)
            .and_then(|regions| regions.get(region_code))
        {
            Some(name) => Resolved::Found(name.as_str()),
            None => Resolved::UsedFallback(region_code.to_string()),
        }
    }

    /// Total number of regions
    pub fn len(&self) -> usize {
        self.by_country.values().map(HashMap::len).sum()
    }

    /// True if no region was loaded
    pub fn is_empty(&self) -> bool {
        self.by_country.values().all(HashMap::is_empty)
    }
}

/// A location joined against the country and region tables
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    /// Location id (table key)
    pub location_id: String,
    /// Raw ISO-2 code from the location row, `-` for unknown
    pub country_code: String,
    /// Country resolved through [`CountryTable`]
    pub country: Resolved<CountryRecord>,
    /// Raw region code from the location row
    pub region_code: String,
    /// Region name resolved through [`RegionTable`]
    pub region: Resolved<String>,
    /// City name
    pub city: String,
    /// Postal code, empty when the source has none
    pub postal_code: String,
    /// Latitude text; parsed when a range is built from this location
    pub latitude: String,
    /// Longitude text; parsed when a range is built from this location
    pub longitude: String,
    /// Metro code
    pub metro_code: String,
    /// Area code
    pub area_code: String,
}

impl LocationRecord {
    /// Country name, or the raw code when the country was not resolved
    pub fn country_name(&self) -> &str {
        match &self.country {
            Resolved::Found(country) => &country.name,
            Resolved::UsedFallback(code) => code,
        }
    }

    /// ISO-3 code when the country was resolved
    pub fn country_code3(&self) -> Option<&str> {
        self.country.found().map(|c| c.code3.as_str())
    }

    /// Region name, or the raw region code when the region was not resolved
    pub fn region_name(&self) -> &str {
        match &self.region {
            Resolved::Found(name) => name,
            Resolved::UsedFallback(code) => code,
        }
    }
}

/// Locations by id
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
    by_id: HashMap<String, LocationRecord>,
}

impl LocationTable {
    /// Join location rows against the country and region tables
    pub fn build<I>(rows: I, countries: &CountryTable, regions: &RegionTable) -> Self
    where
        I: IntoIterator<Item = LocationRow>,
    {
        let mut by_id = HashMap::new();
        let mut country_fallbacks = 0usize;
        let mut region_fallbacks = 0usize;

        for row in rows {
            let region = regions
                .lookup(&row.country, &row.region)
                .map(str::to_string);
            let country = countries.lookup(&row.country).map(CountryRecord::clone);
            if !country.is_found() {
                country_fallbacks += 1;
            }
            if !region.is_found() {
                region_fallbacks += 1;
            }

            let record = LocationRecord {
                location_id: row.location_id,
                country_code: row.country,
                country,
                region_code: row.region,
                region,
                city: row.city,
                postal_code: row.postal_code,
                latitude: row.latitude,
                longitude: row.longitude,
                metro_code: row.metro_code,
                area_code: row.area_code,
            };
            if let Some(previous) = by_id.insert(record.location_id.clone(), record) {
                warn!(
                    "Duplicate location id {:?}; keeping the later row",
                    previous.location_id
                );
            }
        }

        info!(
            "Built location table: {} locations ({} without a known country, {} without a known region)",
            by_id.len(),
            country_fallbacks,
            region_fallbacks
        );
        Self { by_id }
    }

    /// Look up a location by id
    pub fn get(&self, location_id: &str) -> Option<&LocationRecord> {
        self.by_id.get(location_id)
    }

    /// Number of locations
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if no location was loaded
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Title-case a name: first letter of every alphabetic run upper, rest lower
///
/// `"KOREA, REPUBLIC OF"` becomes `"Korea, Republic Of"`, `"COTE D'IVOIRE"`
/// becomes `"Cote D'Ivoire"`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_word = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country(name: &str, code: &str, code3: &str) -> CountryRow {
        CountryRow {
            name: name.to_string(),
            code: code.to_string(),
            code3: code3.to_string(),
            number: String::new(),
        }
    }

    fn region(country: &str, code: &str, name: &str) -> RegionRow {
        RegionRow {
            country_code: country.to_string(),
            region_code: code.to_string(),
            region_name: name.to_string(),
        }
    }

    fn location(id: &str, country: &str, region: &str) -> LocationRow {
        LocationRow {
            location_id: id.to_string(),
            country: country.to_string(),
            region: region.to_string(),
            city: "Somewhere".to_string(),
            postal_code: String::new(),
            latitude: "1.5".to_string(),
            longitude: "-2.5".to_string(),
            metro_code: String::new(),
            area_code: String::new(),
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("UNITED STATES"), "United States");
        assert_eq!(title_case("KOREA, REPUBLIC OF"), "Korea, Republic Of");
        assert_eq!(title_case("COTE D'IVOIRE"), "Cote D'Ivoire");
        assert_eq!(title_case("guinea-bissau"), "Guinea-Bissau");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_country_table_title_cases_names() {
        let table = CountryTable::build(vec![country("UNITED STATES", "US", "USA")]);
        assert_eq!(table.len(), 1);
        let us = table.get("US").unwrap();
        assert_eq!(us.name, "United States");
        assert_eq!(us.code3, "USA");
    }

    #[test]
    fn test_region_lookup_falls_back_to_code() {
        let table = RegionTable::build(vec![region("US", "CA", "California")]);
        assert_eq!(table.lookup("US", "CA"), Resolved::Found("California"));
        assert_eq!(
            table.lookup("US", "ZZ"),
            Resolved::UsedFallback("ZZ".to_string())
        );
        assert_eq!(
            table.lookup("FR", "CA"),
            Resolved::UsedFallback("CA".to_string())
        );
    }

    #[test]
    fn test_location_join_resolves_codes() {
        let countries = CountryTable::build(vec![country("UNITED STATES", "US", "USA")]);
        let regions = RegionTable::build(vec![region("US", "CA", "California")]);
        let locations = LocationTable::build(vec![location("7", "US", "CA")], &countries, &regions);

        let record = locations.get("7").unwrap();
        assert!(record.country.is_found());
        assert!(record.region.is_found());
        assert_eq!(record.country_name(), "United States");
        assert_eq!(record.country_code3(), Some("USA"));
        assert_eq!(record.region_name(), "California");
    }

    #[test]
    fn test_location_join_degrades_on_unknown_codes() {
        let countries = CountryTable::build(vec![country("UNITED STATES", "US", "USA")]);
        let regions = RegionTable::build(vec![region("US", "CA", "California")]);
        let locations = LocationTable::build(vec![location("8", "XK", "07")], &countries, &regions);

        let record = locations.get("8").expect("row must not be dropped");
        assert_eq!(record.country, Resolved::UsedFallback("XK".to_string()));
        assert_eq!(record.region, Resolved::UsedFallback("07".to_string()));
        assert_eq!(record.country_name(), "XK");
        assert_eq!(record.region_name(), "07");
        assert_eq!(record.country_code3(), None);
    }
}
