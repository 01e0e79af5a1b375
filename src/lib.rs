//! Holdings import core: instrument-name canonicalization, classification
//! rules, brokerage report parsing and row building, plus the SQLite store
//! the CLI persists into.

pub mod accounts;
pub mod builder;
pub mod canonical;
pub mod categorizer;
pub mod db;
pub mod error;
pub mod fmt;
pub mod importer;
pub mod models;
pub mod normalizer;
pub mod numbers;
pub mod settings;
pub mod vision;

pub use builder::{build_rows, import_bytes, BuildOutcome};
pub use canonical::canonicalize;
pub use categorizer::{Classification, Matcher, Rule, RuleSet};
pub use error::{Result, RowError, TrackerError};
pub use importer::{detect_report_csv, parse_report_csv, ImportFormat};
pub use models::{HoldingRow, RawRow, Table};
pub use normalizer::normalize_headers;
pub use numbers::{parse_quantity, parse_value_jpy};
