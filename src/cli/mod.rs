pub mod holdings;
pub mod import;
pub mod init;
pub mod rules;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use asset_tracker::db::{get_connection, init_db, DB_FILE};
use asset_tracker::error::Result;
use asset_tracker::settings::get_data_dir;

/// Open the holdings database in the configured data directory, creating
/// it on first use.
pub(crate) fn open_db() -> Result<Connection> {
    let data_dir: PathBuf = get_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let conn = get_connection(&data_dir.join(DB_FILE))?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(
    name = "asset-tracker",
    about = "Track investment holdings imported from brokerage exports."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportMode {
    /// Update rows that share an identity key, insert the rest.
    Merge,
    /// Delete every stored holding first.
    Replace,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for data (default: ~/Documents/asset-tracker)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import a holdings report or flat CSV.
    Import {
        /// Path to the CSV file
        file: String,
        /// Force a parser: report, flat (default: detect)
        #[arg(long)]
        format: Option<String>,
        /// How to apply rows to stored holdings
        #[arg(long, value_enum, default_value_t = ImportMode::Merge)]
        mode: ImportMode,
        /// Validate and preview without writing
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Import rows extracted from a screenshot (JSON array).
    ImportJson {
        /// Path to the JSON file
        file: String,
        #[arg(long, value_enum, default_value_t = ImportMode::Merge)]
        mode: ImportMode,
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// List stored holdings.
    List {
        /// Only this major category
        #[arg(long)]
        major: Option<String>,
        /// Only this account type
        #[arg(long)]
        account: Option<String>,
    },
    /// Export stored holdings as CSV.
    Export {
        /// Output path (default: stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Delete a stored holding by ID.
    Delete {
        /// Holding ID (shown in `asset-tracker list`)
        id: i64,
    },
    /// Print the canonical key for instrument names.
    Canonicalize {
        /// Names to canonicalize
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List classification rules in effect.
    Rules,
}
