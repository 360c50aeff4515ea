//! Error types for the georange library

use thiserror::Error;

/// Result type alias for georange operations
pub type Result<T> = std::result::Result<T, GeoRangeError>;

/// Main error type for run-level failures
///
/// Anything in here stops an import. Problems confined to a single input row
/// are reported as [`RowError`] instead and never abort a load.
#[derive(Debug, Error)]
pub enum GeoRangeError {
    /// A source file or the store log could not be opened, read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path of the file involved
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A reference or range source could not be parsed as CSV
    #[error("CSV error in {path}: {message}")]
    Csv {
        /// Path (or a label for in-memory readers)
        path: String,
        /// Parser message
        message: String,
    },

    /// A reference table came out empty
    #[error("{0} table is empty; refusing to build ranges against it")]
    EmptyTable(&'static str),

    /// Write or commit failure in the backing store
    #[error("Store error: {0}")]
    Store(String),

    /// The store violates an index invariant (dangling boundary, bad payload)
    #[error("Corrupt index: {0}")]
    Corrupt(String),

    /// Payload (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store log record could not be encoded
    #[error("Log encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Query for something the index cannot answer (IPv6, malformed address)
    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

impl GeoRangeError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        GeoRangeError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Per-row failure while turning a range row into a record
///
/// These are logged and counted by the loader, then the row is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    /// The CSV layer could not produce the row at all
    #[error("malformed row: {0}")]
    Malformed(String),

    /// A required column is absent
    #[error("missing column {0}")]
    MissingField(&'static str),

    /// A range bound is not a decimal u32
    #[error("invalid {field} {value:?}")]
    InvalidBound {
        /// Column name
        field: &'static str,
        /// Raw text
        value: String,
    },

    /// range_min is greater than range_max
    #[error("inverted range {min}..{max}")]
    InvertedRange {
        /// Parsed lower bound
        min: u32,
        /// Parsed upper bound
        max: u32,
    },

    /// The location id does not appear in the location table
    #[error("unknown location id {0:?}")]
    UnknownLocation(String),

    /// Latitude or longitude of the joined location is not a number
    #[error("invalid {field} {value:?} for location {location_id:?}")]
    InvalidCoordinate {
        /// "latitude" or "longitude"
        field: &'static str,
        /// Raw text
        value: String,
        /// Location the coordinate belongs to
        location_id: String,
    },
}
