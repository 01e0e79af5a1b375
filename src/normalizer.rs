use tracing::debug;

use crate::accounts::normalize_label;
use crate::error::Result;
use crate::models::Table;
use crate::numbers::is_blank;

/// Header synonyms renamed onto canonical fields. Compared after label
/// normalization, ASCII case-insensitively.
const HEADER_SYNONYMS: &[(&str, &str)] = &[
    ("大分類", "major_category"),
    ("中分類", "sub_category"),
    ("口座区分", "account_type"),
    ("評価額(円)", "value_jpy"),
    ("MajorCategory", "major_category"),
    ("SubCategory", "sub_category"),
    ("AccountType", "account_type"),
    ("Value(JPY)", "value_jpy"),
];

const NAME_COLUMNS: &[&str] = &["銘柄名", "Name"];
const TICKER_COLUMNS: &[&str] = &["ティッカー", "Ticker"];
const QUANTITY_COLUMNS: &[&str] = &["保有数量", "Quantity"];
const SHARE_COUNT_COLUMNS: &[&str] = &["保有数"];
const UNIT_COUNT_COLUMNS: &[&str] = &["口数"];

/// Read a flat CSV: the first record is the header row.
pub fn read_table(text: &str) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len().max(row.len()), String::new());
        rows.push(row);
    }
    Ok(Table::new(headers, rows))
}

fn find_header(headers: &[String], candidates: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| candidates.iter().any(|c| h.eq_ignore_ascii_case(c)))
}

fn rename(table: &mut Table, idx: usize, target: &str) {
    debug!(from = %table.headers[idx], to = target, "renamed column");
    table.headers[idx] = target.to_string();
}

/// Append `target` as a row-wise coalesce of two columns: the primary cell
/// unless it is blank, else the fallback cell.
fn coalesce(table: &mut Table, primary: usize, fallback: usize, target: &str) {
    let width = table.headers.len();
    for row in &mut table.rows {
        let first = row.get(primary).cloned().unwrap_or_default();
        let value = if is_blank(Some(first.as_str())) {
            row.get(fallback).cloned().unwrap_or_default()
        } else {
            first
        };
        row.resize(width, String::new());
        row.push(value);
    }
    debug!(column = target, "coalesced columns");
    table.headers.push(target.to_string());
}

/// Map foreign headers onto canonical field names. Cell values are left
/// untouched, and a canonical field that already exists is never replaced.
pub fn normalize_headers(mut table: Table) -> Table {
    table.headers = table.headers.iter().map(|h| normalize_label(h)).collect();

    for (source, target) in HEADER_SYNONYMS {
        if table.has_column(target) {
            continue;
        }
        if let Some(idx) = find_header(&table.headers, &[*source]) {
            rename(&mut table, idx, target);
        }
    }

    if !table.has_column("name_or_ticker") {
        let name = find_header(&table.headers, NAME_COLUMNS);
        let ticker = find_header(&table.headers, TICKER_COLUMNS);
        match (name, ticker) {
            (Some(name), Some(ticker)) => coalesce(&mut table, name, ticker, "name_or_ticker"),
            (Some(idx), None) | (None, Some(idx)) => rename(&mut table, idx, "name_or_ticker"),
            (None, None) => {}
        }
    }

    if !table.has_column("quantity") {
        if let Some(idx) = find_header(&table.headers, QUANTITY_COLUMNS) {
            rename(&mut table, idx, "quantity");
        } else {
            let shares = find_header(&table.headers, SHARE_COUNT_COLUMNS);
            let units = find_header(&table.headers, UNIT_COUNT_COLUMNS);
            match (shares, units) {
                (Some(shares), Some(units)) => coalesce(&mut table, shares, units, "quantity"),
                (Some(idx), None) | (None, Some(idx)) => rename(&mut table, idx, "quantity"),
                (None, None) => {}
            }
        }
    }

    table
}
