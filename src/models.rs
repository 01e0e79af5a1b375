use serde::Serialize;

/// Canonical column names every import path is normalized onto.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "major_category",
    "sub_category",
    "name_or_ticker",
    "account_type",
    "quantity",
    "value_jpy",
];

/// A validated, canonicalized position ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingRow {
    pub major_category: String,
    pub sub_category: Option<String>,
    pub name_or_ticker: String,
    pub canonical_key: String,
    pub account_type: String,
    pub quantity: Option<f64>,
    pub value_jpy: i64,
    pub category_overridden: bool,
}

/// One input row as cell text, before validation. Flat tables, report
/// parser output and vision payloads all meet here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub major_category: Option<String>,
    pub sub_category: Option<String>,
    pub name_or_ticker: Option<String>,
    pub account_type: Option<String>,
    pub quantity: Option<String>,
    pub value_jpy: Option<String>,
}

/// Intermediate representation from the report parser before row building.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub major_category: String,
    pub sub_category: String,
    pub name_or_ticker: String,
    pub account_type: String,
    pub quantity: Option<f64>,
    pub value_jpy: i64,
}

impl From<ParsedRow> for RawRow {
    fn from(row: ParsedRow) -> Self {
        Self {
            major_category: Some(row.major_category),
            sub_category: Some(row.sub_category),
            name_or_ticker: Some(row.name_or_ticker),
            account_type: Some(row.account_type),
            quantity: row.quantity.map(|q| q.to_string()),
            value_jpy: Some(row.value_jpy.to_string()),
        }
    }
}

/// A header row plus cell rows. Cells are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Project every row onto the canonical columns. Absent columns read as `None`.
    pub fn raw_rows(&self) -> Vec<RawRow> {
        let idx = |name: &str| self.column(name);
        let (major, sub, name, account, quantity, value) = (
            idx("major_category"),
            idx("sub_category"),
            idx("name_or_ticker"),
            idx("account_type"),
            idx("quantity"),
            idx("value_jpy"),
        );
        let get = |row: &[String], col: Option<usize>| -> Option<String> {
            col.and_then(|c| row.get(c)).cloned()
        };
        self.rows
            .iter()
            .map(|row| RawRow {
                major_category: get(row, major),
                sub_category: get(row, sub),
                name_or_ticker: get(row, name),
                account_type: get(row, account),
                quantity: get(row, quantity),
                value_jpy: get(row, value),
            })
            .collect()
    }
}

/// A holding as stored by the SQLite collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredHolding {
    pub id: i64,
    pub major_category: String,
    pub sub_category: Option<String>,
    pub name_or_ticker: String,
    pub canonical_key: Option<String>,
    pub account_type: String,
    pub quantity: Option<f64>,
    pub value_jpy: Option<i64>,
    pub category_overridden: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertResult {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}
