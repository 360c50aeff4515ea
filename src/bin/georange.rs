mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cli_utils::{init_logger, level_override, LogLevel};
use commands::import_cmd::ImportArgs;
use commands::{cmd_compact, cmd_import, cmd_inspect, cmd_query};

#[derive(Parser)]
#[command(name = "georange")]
#[command(
    about = "IPv4 range index for GeoIP city data",
    long_about = "georange - Import a GeoIP city dataset into an IPv4 range index and query it\n\n\
    The blocks file maps IPv4 ranges to location ids. Locations, regions and countries\n\
    are joined in before the ranges are written to an append-only store file.\n\n\
    Examples:\n\
      georange import data/GeoLiteCity-Blocks.csv --store geo.log --reset\n\
      georange query --store geo.log 8.8.8.8\n\
      georange inspect --store geo.log --json\n\
      georange compact --store geo.log"
)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log level (overrides -v and RUST_LOG)
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a blocks file and its reference data into a store
    Import {
        /// Range (blocks) CSV file
        #[arg(value_name = "BLOCKS")]
        blocks: PathBuf,

        /// Store file to write (created if missing)
        #[arg(short, long, value_name = "FILE")]
        store: PathBuf,

        /// Locations file (default: GeoLiteCity-Location.csv next to BLOCKS)
        #[arg(long, value_name = "FILE")]
        locations: Option<PathBuf>,

        /// Regions file (default: regions.csv next to BLOCKS)
        #[arg(long, value_name = "FILE")]
        regions: Option<PathBuf>,

        /// Countries file (default: countries.csv next to BLOCKS)
        #[arg(long, value_name = "FILE")]
        countries: Option<PathBuf>,

        /// Drop the existing range index before loading
        #[arg(long)]
        reset: bool,

        /// Rows per commit
        #[arg(long, default_value_t = georange::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Look up the range containing an IPv4 address
    Query {
        /// Store file to read
        #[arg(short, long, value_name = "FILE")]
        store: PathBuf,

        /// IPv4 address (dotted quad or decimal)
        #[arg(value_name = "IP")]
        ip: String,

        /// Quiet mode - no output, only exit code (0 = found, 1 = not found)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show what a store contains
    Inspect {
        /// Store file to read
        #[arg(short, long, value_name = "FILE")]
        store: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Drop unreachable records and rewrite the store log
    Compact {
        /// Store file to compact
        #[arg(short, long, value_name = "FILE")]
        store: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(level_override(cli.log_level, cli.verbose))?;

    match cli.command {
        Commands::Import {
            blocks,
            store,
            locations,
            regions,
            countries,
            reset,
            batch_size,
        } => cmd_import(ImportArgs {
            blocks,
            store,
            locations,
            regions,
            countries,
            reset,
            batch_size,
        }),
        Commands::Query { store, ip, quiet } => cmd_query(store, ip, quiet),
        Commands::Inspect { store, json } => cmd_inspect(store, json),
        Commands::Compact { store } => cmd_compact(store),
    }
}
