use comfy_table::{Cell, Table};

use asset_tracker::db::{delete_holding, fetch_holdings, HoldingFilter};
use asset_tracker::error::{Result, TrackerError};
use asset_tracker::fmt::{quantity, yen};
use asset_tracker::models::REQUIRED_COLUMNS;

use super::open_db;

pub fn list(major: Option<String>, account: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let filter = HoldingFilter {
        major_category: major,
        account_type: account,
    };
    let holdings = fetch_holdings(&conn, &filter)?;

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Major", "Sub", "Name", "Account", "Quantity", "Value", "Updated",
    ]);
    for h in &holdings {
        table.add_row(vec![
            Cell::new(h.id),
            Cell::new(&h.major_category),
            Cell::new(h.sub_category.as_deref().unwrap_or_default()),
            Cell::new(&h.name_or_ticker),
            Cell::new(&h.account_type),
            Cell::new(quantity(h.quantity)),
            Cell::new(h.value_jpy.map(yen).unwrap_or_default()),
            Cell::new(&h.updated_at),
        ]);
    }
    let total: i64 = holdings.iter().filter_map(|h| h.value_jpy).sum();
    println!("Holdings\n{table}");
    println!("Total: {}", yen(total));
    Ok(())
}

/// Write the canonical columns so the file re-imports as a flat table.
pub fn export(output: Option<String>) -> Result<()> {
    let conn = open_db()?;
    let holdings = fetch_holdings(&conn, &HoldingFilter::default())?;

    let sink: Box<dyn std::io::Write> = match &output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    let mut wtr = csv::Writer::from_writer(sink);
    wtr.write_record(REQUIRED_COLUMNS)?;
    for h in &holdings {
        wtr.write_record([
            h.major_category.clone(),
            h.sub_category.clone().unwrap_or_default(),
            h.name_or_ticker.clone(),
            h.account_type.clone(),
            quantity(h.quantity),
            h.value_jpy.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;

    if let Some(path) = output {
        eprintln!("Exported {} holdings to {path}", holdings.len());
    }
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    if !delete_holding(&conn, id)? {
        return Err(TrackerError::Other(format!("No holding with id {id}")));
    }
    println!("Deleted holding {id}");
    Ok(())
}
