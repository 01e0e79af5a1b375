use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::models::{HoldingRow, StoredHolding, UpsertResult};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS holdings (
    id INTEGER PRIMARY KEY,
    major_category TEXT NOT NULL,
    sub_category TEXT,
    name_or_ticker TEXT NOT NULL,
    canonical_key TEXT,
    account_type TEXT NOT NULL,
    quantity REAL,
    value_jpy INTEGER CHECK (value_jpy IS NULL OR value_jpy >= 0),
    category_overridden INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_holdings_key ON holdings (canonical_key, account_type);
";

pub const DB_FILE: &str = "holdings.db";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn validate(rows: &[HoldingRow]) -> Result<()> {
    if rows.iter().any(|r| r.value_jpy < 0) {
        return Err(TrackerError::Validation(
            "value_jpy must be 0 or greater".to_string(),
        ));
    }
    Ok(())
}

fn insert_row(conn: &Connection, row: &HoldingRow, updated_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO holdings (major_category, sub_category, name_or_ticker, canonical_key, \
         account_type, quantity, value_jpy, category_overridden, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            row.major_category,
            row.sub_category,
            row.name_or_ticker,
            row.canonical_key,
            row.account_type,
            row.quantity,
            row.value_jpy,
            row.category_overridden,
            updated_at,
        ],
    )?;
    Ok(())
}

fn find_existing(conn: &Connection, row: &HoldingRow) -> Result<Option<StoredHolding>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, major_category, sub_category, name_or_ticker, canonical_key, account_type, \
         quantity, value_jpy, category_overridden, updated_at FROM holdings \
         WHERE account_type = ?1 AND ( \
             (canonical_key IS NOT NULL AND canonical_key != '' AND canonical_key = ?2) \
             OR ((canonical_key IS NULL OR canonical_key = '') \
                 AND major_category = ?3 AND name_or_ticker = ?4)) \
         ORDER BY id LIMIT 1",
    )?;
    let found = stmt
        .query_row(
            rusqlite::params![row.account_type, row.canonical_key, row.major_category, row.name_or_ticker],
            map_holding,
        )
        .optional()?;
    Ok(found)
}

fn unchanged(existing: &StoredHolding, row: &HoldingRow) -> bool {
    existing.major_category == row.major_category
        && existing.sub_category == row.sub_category
        && existing.name_or_ticker == row.name_or_ticker
        && existing.canonical_key.as_deref() == Some(row.canonical_key.as_str())
        && existing.quantity == row.quantity
        && existing.value_jpy == Some(row.value_jpy)
        && existing.category_overridden == row.category_overridden
}

/// Merge rows by identity key: `(canonical_key, account_type)`, or
/// `(major_category, name_or_ticker, account_type)` for stored rows that
/// predate canonical keys.
pub fn upsert_by_key(conn: &mut Connection, rows: &[HoldingRow]) -> Result<UpsertResult> {
    validate(rows)?;
    let tx = conn.transaction()?;
    let updated_at = now();
    let mut result = UpsertResult::default();
    for row in rows {
        match find_existing(&tx, row)? {
            Some(existing) if unchanged(&existing, row) => result.skipped += 1,
            Some(existing) => {
                tx.execute(
                    "UPDATE holdings SET major_category = ?1, sub_category = ?2, name_or_ticker = ?3, \
                     canonical_key = ?4, quantity = ?5, value_jpy = ?6, category_overridden = ?7, \
                     updated_at = ?8 WHERE id = ?9",
                    rusqlite::params![
                        row.major_category,
                        row.sub_category,
                        row.name_or_ticker,
                        row.canonical_key,
                        row.quantity,
                        row.value_jpy,
                        row.category_overridden,
                        updated_at,
                        existing.id,
                    ],
                )?;
                result.updated += 1;
            }
            None => {
                insert_row(&tx, row, &updated_at)?;
                result.inserted += 1;
            }
        }
    }
    tx.commit()?;
    info!(
        inserted = result.inserted,
        updated = result.updated,
        skipped = result.skipped,
        "merged holdings"
    );
    Ok(result)
}

/// Replace every stored holding with `rows`.
pub fn replace_all(conn: &mut Connection, rows: &[HoldingRow]) -> Result<usize> {
    validate(rows)?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM holdings", [])?;
    let updated_at = now();
    for row in rows {
        insert_row(&tx, row, &updated_at)?;
    }
    tx.commit()?;
    info!(rows = rows.len(), "replaced holdings");
    Ok(rows.len())
}

fn map_holding(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredHolding> {
    Ok(StoredHolding {
        id: row.get(0)?,
        major_category: row.get(1)?,
        sub_category: row.get(2)?,
        name_or_ticker: row.get(3)?,
        canonical_key: row.get(4)?,
        account_type: row.get(5)?,
        quantity: row.get(6)?,
        value_jpy: row.get(7)?,
        category_overridden: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct HoldingFilter {
    pub major_category: Option<String>,
    pub account_type: Option<String>,
}

pub fn fetch_holdings(conn: &Connection, filter: &HoldingFilter) -> Result<Vec<StoredHolding>> {
    let mut stmt = conn.prepare(
        "SELECT id, major_category, sub_category, name_or_ticker, canonical_key, account_type, \
         quantity, value_jpy, category_overridden, updated_at FROM holdings \
         WHERE (?1 IS NULL OR major_category = ?1) AND (?2 IS NULL OR account_type = ?2) \
         ORDER BY updated_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::params![filter.major_category, filter.account_type],
            map_holding,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Returns false when no holding has that id.
pub fn delete_holding(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM holdings WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn holding(name: &str, key: &str, account: &str, value: i64) -> HoldingRow {
        HoldingRow {
            major_category: "投資信託".into(),
            sub_category: Some("全世界".into()),
            name_or_ticker: name.into(),
            canonical_key: key.into(),
            account_type: account.into(),
            quantity: Some(10.0),
            value_jpy: value,
            category_overridden: true,
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_upsert_inserts_updates_and_skips() {
        let (_dir, mut conn) = test_db();
        let first = vec![
            holding("A", "A", "NISA(成長)", 100),
            holding("A", "A", "特定", 200),
        ];
        let r = upsert_by_key(&mut conn, &first).unwrap();
        assert_eq!(r, UpsertResult { inserted: 2, updated: 0, skipped: 0 });

        let second = vec![
            holding("Ａ", "A", "NISA(成長)", 150),
            holding("A", "A", "特定", 200),
            holding("B", "B", "特定", 300),
        ];
        let r = upsert_by_key(&mut conn, &second).unwrap();
        assert_eq!(r, UpsertResult { inserted: 1, updated: 1, skipped: 1 });

        let all = fetch_holdings(&conn, &HoldingFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        let nisa = all.iter().find(|h| h.account_type == "NISA(成長)").unwrap();
        assert_eq!(nisa.value_jpy, Some(150));
        assert_eq!(nisa.name_or_ticker, "Ａ");
    }

    #[test]
    fn test_legacy_rows_match_on_name() {
        let (_dir, mut conn) = test_db();
        conn.execute(
            "INSERT INTO holdings (major_category, name_or_ticker, account_type, value_jpy, updated_at) \
             VALUES ('投資信託', 'A', '特定', 1, '2024-01-01')",
            [],
        )
        .unwrap();
        let r = upsert_by_key(&mut conn, &[holding("A", "A", "特定", 5)]).unwrap();
        assert_eq!(r.updated, 1);
        let all = fetch_holdings(&conn, &HoldingFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].canonical_key.as_deref(), Some("A"));
    }

    #[test]
    fn test_replace_all_and_filters() {
        let (_dir, mut conn) = test_db();
        upsert_by_key(&mut conn, &[holding("old", "OLD", "特定", 1)]).unwrap();
        let mut stock = holding("NTT", "NTT", "NISA(成長)", 2);
        stock.major_category = "日本株".into();
        replace_all(&mut conn, &[holding("new", "NEW", "特定", 3), stock]).unwrap();

        let all = fetch_holdings(&conn, &HoldingFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|h| h.name_or_ticker != "old"));

        let filter = HoldingFilter {
            major_category: Some("日本株".into()),
            account_type: None,
        };
        let stocks = fetch_holdings(&conn, &filter).unwrap();
        assert_eq!(stocks.len(), 1);
        assert!(delete_holding(&conn, stocks[0].id).unwrap());
        assert!(!delete_holding(&conn, stocks[0].id).unwrap());
    }

    #[test]
    fn test_negative_value_rejected_before_write() {
        let (_dir, mut conn) = test_db();
        let err = replace_all(&mut conn, &[holding("A", "A", "特定", -1)]).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
        assert!(fetch_holdings(&conn, &HoldingFilter::default()).unwrap().is_empty());
    }
}
