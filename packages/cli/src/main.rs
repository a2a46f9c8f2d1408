#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `septic_locator`: command-line toolchain for the septic locator.
//!
//! Creates the feature store, registers data sources, imports `GeoJSON`
//! datasets, runs one-off lookups, and starts the API server. Run without
//! a subcommand for an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`septic_locator_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use septic_locator_ingest::ImportOptions;

#[derive(Parser)]
#[command(name = "septic_locator", about = "Septic/sewer lookup toolchain")]
struct Cli {
    /// Feature store file (overrides `SEPTIC_DB_PATH`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Lookup log file (overrides `SEPTIC_LOOKUP_LOG_PATH`)
    #[arg(long, global = true)]
    log_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// Create the feature store tables
    Migrate,
    /// Register data sources from a TOML seed file (defaults to the bundled Florida seed)
    Seed {
        /// Seed file with a `[[sources]]` array
        file: Option<PathBuf>,
    },
    /// Import septic records from a `GeoJSON` `FeatureCollection`
    Import {
        /// `GeoJSON` file to read
        file: PathBuf,
        /// Registered source ID the records belong to
        #[arg(long)]
        source: String,
        /// County recorded on every record
        #[arg(long)]
        county: String,
        /// State abbreviation recorded on every record
        #[arg(long)]
        state: String,
        /// Provenance tag (defaults to the source name)
        #[arg(long)]
        data_source: Option<String>,
    },
    /// Classify one location and print the result as JSON
    Lookup {
        /// Latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Search radius in meters (defaults to `SEPTIC_DEFAULT_RADIUS_M`)
        #[arg(long)]
        radius: Option<f64>,
    },
    /// List registered data sources
    Sources,
    /// Show recent logged lookups
    History {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = septic_locator_cli_utils::init_logger();
    let cli = Cli::parse();
    let path = commands::store_path(cli.db);
    let log_path = commands::log_path(cli.log_db);

    let Some(command) = cli.command else {
        return interactive::run(&path, &log_path, &multi).await;
    };

    match command {
        Commands::Serve => commands::serve().await?,
        Commands::Migrate => commands::migrate(&path)?,
        Commands::Seed { file } => commands::seed(&path, file.as_deref())?,
        Commands::Import {
            file,
            source,
            county,
            state,
            data_source,
        } => {
            let options = ImportOptions {
                source_id: source,
                county,
                state,
                data_source,
            };
            commands::import(&path, &file, &options, &multi)?;
        }
        Commands::Lookup { lat, lng, radius } => commands::lookup(&path, lat, lng, radius).await?,
        Commands::Sources => commands::list_sources(&path)?,
        Commands::History { limit } => commands::history(&log_path, limit)?,
    }

    Ok(())
}
