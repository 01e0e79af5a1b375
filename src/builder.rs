//! Row building: turns raw cell text from any import path into validated,
//! canonicalized holding rows, collecting every row problem in one pass.

use tracing::{debug, info};

use crate::accounts::normalize_account_type;
use crate::canonical::canonicalize;
use crate::categorizer::RuleSet;
use crate::error::{Result, RowError, TrackerError};
use crate::importer::{parse_detected_report, ImportFormat};
use crate::models::{HoldingRow, RawRow, Table, REQUIRED_COLUMNS};
use crate::normalizer::{normalize_headers, read_table};
use crate::numbers::{parse_quantity, parse_value_jpy};

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn build_row(raw: &RawRow, row_no: usize, rules: &RuleSet) -> std::result::Result<HoldingRow, RowError> {
    let value_jpy = match parse_value_jpy(raw.value_jpy.as_deref()) {
        Ok(Some(value)) => value,
        Ok(None) => return Err(RowError::new(row_no, "valuation is required")),
        Err(TrackerError::Validation(msg)) => return Err(RowError::new(row_no, msg)),
        Err(_) => {
            return Err(RowError::new(
                row_no,
                format!(
                    "valuation is not a whole number: '{}'",
                    raw.value_jpy.as_deref().unwrap_or_default().trim()
                ),
            ))
        }
    };

    let Some(name_or_ticker) = trimmed(raw.name_or_ticker.as_deref()) else {
        return Err(RowError::new(row_no, "name or ticker is required"));
    };

    let key = canonicalize(name_or_ticker.as_str());
    let major_category = trimmed(raw.major_category.as_deref()).unwrap_or_default();
    let sub_category = trimmed(raw.sub_category.as_deref());
    let classification = rules.classify(&key, &major_category, sub_category.as_deref(), &name_or_ticker);

    if classification.major_category.is_empty() {
        return Err(RowError::new(row_no, "major category is required"));
    }

    let account_type = normalize_account_type(raw.account_type.as_deref())
        .or_else(|| trimmed(raw.account_type.as_deref()))
        .unwrap_or_default();

    Ok(HoldingRow {
        major_category: classification.major_category,
        sub_category: classification.sub_category,
        canonical_key: canonicalize(classification.display_name.as_str()),
        name_or_ticker: classification.display_name,
        account_type,
        quantity: parse_quantity(raw.quantity.as_deref()).ok().flatten(),
        value_jpy,
        category_overridden: classification.overridden,
    })
}

/// Validate and canonicalize every row independently. A failing row is
/// reported and skipped; the others are still built.
pub fn build_rows(rows: &[RawRow], rules: &RuleSet) -> (Vec<HoldingRow>, Vec<RowError>) {
    let mut built = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (idx, raw) in rows.iter().enumerate() {
        match build_row(raw, idx + 1, rules) {
            Ok(row) => built.push(row),
            Err(e) => {
                debug!(row = e.row, message = %e.message, "row rejected");
                errors.push(e);
            }
        }
    }
    info!(rows = built.len(), errors = errors.len(), "built holding rows");
    (built, errors)
}

/// Build rows from a flat table whose headers have already been normalized.
pub fn build_rows_from_table(table: &Table, rules: &RuleSet) -> Result<(Vec<HoldingRow>, Vec<RowError>)> {
    let missing = table.missing_columns(REQUIRED_COLUMNS);
    if !missing.is_empty() {
        return Err(TrackerError::Format(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }
    Ok(build_rows(&table.raw_rows(), rules))
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub format: ImportFormat,
    pub rows: Vec<HoldingRow>,
    pub errors: Vec<RowError>,
}

impl BuildOutcome {
    pub fn total_value(&self) -> i64 {
        self.rows.iter().map(|r| r.value_jpy).sum()
    }
}

/// Turn uploaded bytes into holding rows. `format` forces a parser,
/// otherwise the report format is detected and flat tables are the fallback.
/// Forcing the report parser onto input that is not a report is a format error.
pub fn import_bytes(data: &[u8], rules: &RuleSet, format: Option<ImportFormat>) -> Result<BuildOutcome> {
    let (detected, text) = ImportFormat::detect(data)?;
    let format = format.unwrap_or(detected);
    let (rows, errors) = match format {
        ImportFormat::Report => {
            let raw: Vec<RawRow> = parse_detected_report(detected == ImportFormat::Report, &text)?
                .into_iter()
                .map(RawRow::from)
                .collect();
            build_rows(&raw, rules)
        }
        ImportFormat::Flat => {
            let table = normalize_headers(read_table(&text)?);
            build_rows_from_table(&table, rules)?
        }
    };
    Ok(BuildOutcome { format, rows, errors })
}
