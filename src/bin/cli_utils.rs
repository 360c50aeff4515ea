use anyhow::{Context, Result};
use clap::ValueEnum;
use georange::RangeRecord;
use log::LevelFilter;
use serde_json::{json, Value};
use std::io::Write;

/// Log verbosity accepted by `--log-level`
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Resolve `--log-level` and `-v` into a filter override
///
/// An explicit level wins, then each `-v` steps up from info. With neither,
/// `RUST_LOG` (or info) decides.
pub fn level_override(level: Option<LogLevel>, verbose: u8) -> Option<LevelFilter> {
    match (level, verbose) {
        (Some(level), _) => Some(level.into()),
        (None, 0) => None,
        (None, 1) => Some(LevelFilter::Debug),
        (None, _) => Some(LevelFilter::Trace),
    }
}

/// Initialize `env_logger` on stderr, so stdout stays clean for JSON output
pub fn init_logger(level: Option<LevelFilter>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{} {:<5} {}] {}",
            buf.timestamp_millis(),
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder
        .try_init()
        .context("Failed to initialize logger")?;
    Ok(())
}

/// JSON view of a range record, with dotted-quad bounds added
pub fn record_to_json(record: &RangeRecord) -> Value {
    json!({
        "range": format!("{}-{}", record.start(), record.end()),
        "range_min": record.range_min,
        "range_max": record.range_max,
        "latitude": record.latitude,
        "longitude": record.longitude,
        "postal_code": record.postal_code,
    })
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
