use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use asset_tracker::builder::{build_rows, import_bytes};
use asset_tracker::db::{replace_all, upsert_by_key};
use asset_tracker::error::{Result, RowError, TrackerError};
use asset_tracker::fmt::{quantity, yen};
use asset_tracker::importer::ImportFormat;
use asset_tracker::models::{HoldingRow, RawRow};
use asset_tracker::settings::load_settings;
use asset_tracker::vision::parse_vision_payload;

use super::{open_db, ImportMode};

pub fn run(file: &str, format: Option<&str>, mode: ImportMode, dry_run: bool) -> Result<()> {
    let format = format
        .map(|key| {
            ImportFormat::from_key(key).ok_or_else(|| TrackerError::Other(format!("Unknown format: {key}")))
        })
        .transpose()?;
    let rules = load_settings().rule_set()?;
    let data = std::fs::read(PathBuf::from(file))?;

    let outcome = import_bytes(&data, &rules, format)?;
    println!("Format: {}", outcome.format.key());
    apply(&outcome.rows, &outcome.errors, mode, dry_run)
}

pub fn run_json(file: &str, mode: ImportMode, dry_run: bool) -> Result<()> {
    let rules = load_settings().rule_set()?;
    let text = std::fs::read_to_string(PathBuf::from(file))?;

    let (vision_rows, mut errors) = parse_vision_payload(&text)?;
    let raw: Vec<RawRow> = vision_rows.into_iter().map(|r| r.raw).collect();
    let (rows, build_errors) = build_rows(&raw, &rules);
    errors.extend(build_errors);
    apply(&rows, &errors, mode, dry_run)
}

fn preview(rows: &[HoldingRow]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Name", "Key", "Major", "Sub", "Rule", "Account", "Quantity", "Value",
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.name_or_ticker),
            Cell::new(&row.canonical_key),
            Cell::new(&row.major_category),
            Cell::new(row.sub_category.as_deref().unwrap_or_default()),
            Cell::new(if row.category_overridden { "yes" } else { "" }),
            Cell::new(&row.account_type),
            Cell::new(quantity(row.quantity)),
            Cell::new(yen(row.value_jpy)),
        ]);
    }
    println!("{table}");
}

/// Confirm-then-commit: any row error blocks the whole import.
fn apply(rows: &[HoldingRow], errors: &[RowError], mode: ImportMode, dry_run: bool) -> Result<()> {
    if !errors.is_empty() {
        eprintln!("{}", "Rows failed validation; nothing was imported.".red().bold());
        for e in errors {
            eprintln!("  {e}");
        }
        return Err(TrackerError::Other(format!("{} row error(s)", errors.len())));
    }

    preview(rows);
    let total: i64 = rows.iter().map(|r| r.value_jpy).sum();
    println!("{} rows, total {}", rows.len(), yen(total).bold());

    if dry_run {
        println!("Dry run: nothing written.");
        return Ok(());
    }

    let mut conn = open_db()?;
    match mode {
        ImportMode::Replace => {
            let n = replace_all(&mut conn, rows)?;
            println!("{}", format!("Replaced holdings with {n} rows.").green());
        }
        ImportMode::Merge => {
            let r = upsert_by_key(&mut conn, rows)?;
            println!(
                "{}",
                format!(
                    "inserted {} / updated {} / skipped {}",
                    r.inserted, r.updated, r.skipped
                )
                .green()
            );
        }
    }
    Ok(())
}
