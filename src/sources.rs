//! CSV readers for the four input files
//!
//! | file      | header           | columns                                        |
//! |-----------|------------------|------------------------------------------------|
//! | countries | none             | name, ISO-2, ISO-3, number                     |
//! | regions   | none             | country code, region code, region name         |
//! | locations | banner + header  | locId, country, region, city, postalCode, ...  |
//! | blocks    | banner + header  | startIpNum, endIpNum, locId                    |
//!
//! Failing to open or read a file is fatal and logged at error level. A bad
//! row in a reference file is skipped with a warning. A bad row in the
//! blocks file is handed to the loader as a [`RowError`] so it gets counted.
//!
//! The published files are ISO-8859-1. Records are read as bytes and every
//! field is decoded on its own: valid UTF-8 is taken as is, anything else is
//! read as Latin-1, so an accented city or country name never drops a row.

use crate::error::{GeoRangeError, Result, RowError};
use crate::range_record::RangeRow;
use crate::reference::{CountryRow, LocationRow, RegionRow};
use log::{error, warn};
use std::fs::File;
use std::borrow::Cow;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Columns the location header must have
const REQUIRED_LOCATION_COLUMNS: [&str; 4] = ["locId", "country", "latitude", "longitude"];

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| {
        error!("could not open file {} for reading: {}", path.display(), e);
        GeoRangeError::io(path, e)
    })
}

fn csv_error(label: &str, err: csv::Error) -> GeoRangeError {
    GeoRangeError::Csv {
        path: label.to_string(),
        message: err.to_string(),
    }
}

/// Skip `count` banner lines; a file shorter than that is simply empty
fn skip_lines<R: BufRead>(reader: &mut R, count: usize, label: &str) -> Result<()> {
    let mut line = Vec::new();
    for _ in 0..count {
        line.clear();
        reader
            .read_until(b'\n', &mut line)
            .map_err(|e| GeoRangeError::io(label, e))?;
    }
    Ok(())
}

/// Decode one field: UTF-8 when valid, ISO-8859-1 otherwise
fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        // Latin-1 bytes are the first 256 code points
        Err(_) => Cow::Owned(bytes.iter().copied().map(char::from).collect()),
    }
}

fn decode_record(record: &csv::ByteRecord) -> csv::StringRecord {
    record.iter().map(decode_field).collect()
}

fn headerless<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Read the countries file
pub fn read_countries(path: &Path) -> Result<Vec<CountryRow>> {
    countries_from_reader(open(path)?, &path.display().to_string())
}

/// Parse countries from any reader; `label` names the source in messages
pub fn countries_from_reader<R: Read>(reader: R, label: &str) -> Result<Vec<CountryRow>> {
    let mut rows = Vec::new();
    for (line, record) in headerless(reader).into_byte_records().enumerate() {
        let record = decode_record(&record.map_err(|e| csv_error(label, e))?);
        match (record.get(0), record.get(1), record.get(2)) {
            (Some(name), Some(code), Some(code3)) if !code.is_empty() => rows.push(CountryRow {
                name: name.to_string(),
                code: code.to_string(),
                code3: code3.to_string(),
                number: record.get(3).unwrap_or_default().to_string(),
            }),
            _ => warn!("{}: skipping country row {}: {:?}", label, line + 1, record),
        }
    }
    Ok(rows)
}

/// Read the regions file
pub fn read_regions(path: &Path) -> Result<Vec<RegionRow>> {
    regions_from_reader(open(path)?, &path.display().to_string())
}

/// Parse regions from any reader
pub fn regions_from_reader<R: Read>(reader: R, label: &str) -> Result<Vec<RegionRow>> {
    let mut rows = Vec::new();
    for (line, record) in headerless(reader).into_byte_records().enumerate() {
        let record = decode_record(&record.map_err(|e| csv_error(label, e))?);
        if record.len() != 3 {
            warn!(
                "{}: skipping region row {} with {} fields",
                label,
                line + 1,
                record.len()
            );
            continue;
        }
        rows.push(RegionRow {
            country_code: record[0].to_string(),
            region_code: record[1].to_string(),
            region_name: record[2].to_string(),
        });
    }
    Ok(rows)
}

/// Read the locations file (copyright line, then header)
pub fn read_locations(path: &Path) -> Result<Vec<LocationRow>> {
    locations_from_reader(open(path)?, &path.display().to_string())
}

/// Parse locations from any reader
pub fn locations_from_reader<R: BufRead>(mut reader: R, label: &str) -> Result<Vec<LocationRow>> {
    skip_lines(&mut reader, 1, label)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = decode_record(csv_reader.byte_headers().map_err(|e| csv_error(label, e))?);
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    for column in REQUIRED_LOCATION_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(GeoRangeError::Csv {
                path: label.to_string(),
                message: format!(
                    "location header is missing column {:?} (found: {})",
                    column,
                    headers.iter().collect::<Vec<_>>().join(", ")
                ),
            });
        }
    }

    let mut rows = Vec::new();
    for (line, record) in csv_reader.into_byte_records().enumerate() {
        let record = record.map_err(|e| csv_error(label, e))?;
        match decode_record(&record).deserialize::<LocationRow>(Some(&headers)) {
            Ok(row) => rows.push(row),
            // +3: banner, header, 1-based
            Err(e) => warn!("{}: skipping location row {}: {}", label, line + 3, e),
        }
    }
    Ok(rows)
}

/// Streaming reader over the blocks file
///
/// Yields one item per data row. A row the CSV layer cannot read, or one
/// with fewer than three columns, comes out as a [`RowError`]. An I/O error
/// ends the iteration and is kept for [`finish`](Self::finish).
pub struct RangeRows<R: Read> {
    records: csv::ByteRecordsIntoIter<R>,
    fatal: Option<GeoRangeError>,
    label: String,
}

/// Open the blocks file (copyright line and header are skipped)
pub fn open_ranges(path: &Path) -> Result<RangeRows<BufReader<File>>> {
    ranges_from_reader(open(path)?, &path.display().to_string())
}

/// Range rows from any reader
pub fn ranges_from_reader<R: BufRead>(mut reader: R, label: &str) -> Result<RangeRows<R>> {
    skip_lines(&mut reader, 2, label)?;
    Ok(RangeRows {
        records: headerless(reader).into_byte_records(),
        fatal: None,
        label: label.to_string(),
    })
}

impl<R: Read> RangeRows<R> {
    /// Surface an I/O error that cut the iteration short
    pub fn finish(self) -> Result<()> {
        match self.fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<R: Read> Iterator for RangeRows<R> {
    type Item = std::result::Result<RangeRow, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fatal.is_some() {
            return None;
        }
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                error!("read error in {}: {}", self.label, e);
                self.fatal = Some(csv_error(&self.label, e));
                return None;
            }
            Err(e) => return Some(Err(RowError::Malformed(e.to_string()))),
        };

        Some(range_row(&decode_record(&record)))
    }
}

fn range_row(record: &csv::StringRecord) -> std::result::Result<RangeRow, RowError> {
    let field = |i: usize, name: &'static str| {
        record
            .get(i)
            .map(str::to_string)
            .ok_or(RowError::MissingField(name))
    };
    Ok(RangeRow {
        range_min: field(0, "range_min")?,
        range_max: field(1, "range_max")?,
        location_id: field(2, "location_id")?,
    })
}
