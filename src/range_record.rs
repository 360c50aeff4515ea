//! Range records: one IPv4 interval and its geographic payload
//!
//! A [`RangeRow`] is what the blocks source delivers: two decimal bounds and
//! a location id, all still text. [`RangeRecord::from_row`] joins it against
//! the [`LocationTable`] and produces the record that gets stored, or
//! explains why the row cannot be used.

use crate::error::{Result, RowError};
use crate::reference::{LocationRecord, LocationTable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Country code the source uses for "no known location"
pub const UNKNOWN_COUNTRY: &str = "-";

/// Unparsed row from the blocks source: `startIpNum, endIpNum, locId`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRow {
    /// Lower bound, decimal text
    pub range_min: String,
    /// Upper bound (inclusive), decimal text
    pub range_max: String,
    /// Location id to join on
    pub location_id: String,
}

impl RangeRow {
    /// Convenience constructor
    pub fn new(
        range_min: impl Into<String>,
        range_max: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Self {
        Self {
            range_min: range_min.into(),
            range_max: range_max.into(),
            location_id: location_id.into(),
        }
    }
}

/// An inclusive IPv4 interval with the coordinates of its location
///
/// This is the unit of storage in the range index. Its JSON encoding is the
/// payload stored under the record key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRecord {
    /// First address of the range
    pub range_min: u32,
    /// Last address of the range (inclusive)
    pub range_max: u32,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Postal code, empty if the location has none
    #[serde(default)]
    pub postal_code: String,
}

impl RangeRecord {
    /// Create a record from already-validated parts
    pub fn new(
        range_min: u32,
        range_max: u32,
        latitude: f64,
        longitude: f64,
        postal_code: impl Into<String>,
    ) -> Self {
        debug_assert!(range_min <= range_max);
        Self {
            range_min,
            range_max,
            latitude,
            longitude,
            postal_code: postal_code.into(),
        }
    }

    /// Build a record from a raw range row
    ///
    /// Returns `Ok(None)` for a junk row (unknown country with zero
    /// coordinates): that is a filter, not a failure.
    pub fn from_row(
        row: &RangeRow,
        locations: &LocationTable,
    ) -> std::result::Result<Option<Self>, RowError> {
        let location = locations
            .get(&row.location_id)
            .ok_or_else(|| RowError::UnknownLocation(row.location_id.clone()))?;

        let range_min = parse_bound("range_min", &row.range_min)?;
        let range_max = parse_bound("range_max", &row.range_max)?;
        if range_min > range_max {
            return Err(RowError::InvertedRange {
                min: range_min,
                max: range_max,
            });
        }

        let latitude = parse_coordinate("latitude", &location.latitude, location)?;
        let longitude = parse_coordinate("longitude", &location.longitude, location)?;

        if is_junk(&location.country_code, latitude, longitude) {
            return Ok(None);
        }

        Ok(Some(Self::new(
            range_min,
            range_max,
            latitude,
            longitude,
            location.postal_code.clone(),
        )))
    }

    /// True if `ip` lies within `[range_min, range_max]`
    pub fn contains(&self, ip: u32) -> bool {
        self.range_min <= ip && ip <= self.range_max
    }

    /// First address as an `Ipv4Addr`
    pub fn start(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.range_min)
    }

    /// Last address as an `Ipv4Addr`
    pub fn end(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.range_max)
    }

    /// Number of addresses covered
    pub fn size(&self) -> u64 {
        u64::from(self.range_max) - u64::from(self.range_min) + 1
    }

    /// Payload bytes as stored in the index
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Inverse of [`encode`](Self::encode)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Display for RangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} ({}, {})",
            self.start(),
            self.end(),
            self.latitude,
            self.longitude
        )?;
        if !self.postal_code.is_empty() {
            write!(f, " {}", self.postal_code)?;
        }
        Ok(())
    }
}

/// Placeholder ranges: unknown country and no usable coordinates
pub fn is_junk(country_code: &str, latitude: f64, longitude: f64) -> bool {
    country_code == UNKNOWN_COUNTRY && latitude == 0.0 && longitude == 0.0
}

fn parse_bound(field: &'static str, value: &str) -> std::result::Result<u32, RowError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| RowError::InvalidBound {
            field,
            value: value.to_string(),
        })
}

fn parse_coordinate(
    field: &'static str,
    value: &str,
    location: &LocationRecord,
) -> std::result::Result<f64, RowError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RowError::InvalidCoordinate {
            field,
            value: value.to_string(),
            location_id: location.location_id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{CountryTable, LocationRow, RegionTable};

    fn table(rows: &[(&str, &str, &str, &str, &str)]) -> LocationTable {
        let rows = rows
            .iter()
            .map(|(id, country, lat, lon, postal)| LocationRow {
                location_id: id.to_string(),
                country: country.to_string(),
                region: String::new(),
                city: String::new(),
                postal_code: postal.to_string(),
                latitude: lat.to_string(),
                longitude: lon.to_string(),
                metro_code: String::new(),
                area_code: String::new(),
            });
        LocationTable::build(rows, &CountryTable::default(), &RegionTable::default())
    }

    #[test]
    fn test_from_row_builds_record() {
        let locations = table(&[("1", "US", "34.0452", "-118.2840", "90001")]);
        let record = RangeRecord::from_row(&RangeRow::new("16777216", "16777471", "1"), &locations)
            .unwrap()
            .unwrap();

        assert_eq!(record.range_min, 16_777_216);
        assert_eq!(record.range_max, 16_777_471);
        assert_eq!(record.latitude, 34.0452);
        assert_eq!(record.longitude, -118.284);
        assert_eq!(record.postal_code, "90001");
        assert_eq!(record.start(), Ipv4Addr::new(1, 0, 0, 0));
        assert_eq!(record.end(), Ipv4Addr::new(1, 0, 0, 255));
        assert_eq!(record.size(), 256);
    }

    #[test]
    fn test_missing_postal_code_is_empty() {
        let locations = table(&[("1", "GB", "51.5", "-0.13", "")]);
        let record = RangeRecord::from_row(&RangeRow::new("1", "2", "1"), &locations)
            .unwrap()
            .unwrap();
        assert_eq!(record.postal_code, "");
    }

    #[test]
    fn test_junk_filter() {
        let locations = table(&[
            ("junk", "-", "0", "0.0", ""),
            ("lat", "-", "1.0", "0", ""),
            ("country", "FR", "0", "0", ""),
        ]);

        assert_eq!(
            RangeRecord::from_row(&RangeRow::new("1", "2", "junk"), &locations),
            Ok(None)
        );
        assert!(RangeRecord::from_row(&RangeRow::new("1", "2", "lat"), &locations)
            .unwrap()
            .is_some());
        assert!(RangeRecord::from_row(&RangeRow::new("1", "2", "country"), &locations)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_row_errors() {
        let locations = table(&[("1", "US", "10", "20", ""), ("bad", "US", "north", "20", "")]);

        assert_eq!(
            RangeRecord::from_row(&RangeRow::new("abc", "2", "1"), &locations),
            Err(RowError::InvalidBound {
                field: "range_min",
                value: "abc".to_string()
            })
        );
        assert!(matches!(
            RangeRecord::from_row(&RangeRow::new("1", "4294967296", "1"), &locations),
            Err(RowError::InvalidBound { field: "range_max", .. })
        ));
        assert_eq!(
            RangeRecord::from_row(&RangeRow::new("9", "3", "1"), &locations),
            Err(RowError::InvertedRange { min: 9, max: 3 })
        );
        assert_eq!(
            RangeRecord::from_row(&RangeRow::new("1", "2", "nope"), &locations),
            Err(RowError::UnknownLocation("nope".to_string()))
        );
        assert!(matches!(
            RangeRecord::from_row(&RangeRow::new("1", "2", "bad"), &locations),
            Err(RowError::InvalidCoordinate { field: "latitude", .. })
        ));
    }

    #[test]
    fn test_payload_encoding() {
        let record = RangeRecord::new(10, 20, 1.25, -3.5, "75001");
        let bytes = record.encode().unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"range_min":10,"range_max":20,"latitude":1.25,"longitude":-3.5,"postal_code":"75001"}"#
        );
        assert_eq!(RangeRecord::decode(&bytes).unwrap(), record);
        assert!(RangeRecord::decode(b"not json").is_err());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let record = RangeRecord::new(100, 200, 0.0, 0.0, "");
        assert!(!record.contains(99));
        assert!(record.contains(100));
        assert!(record.contains(150));
        assert!(record.contains(200));
        assert!(!record.contains(201));
    }
}
