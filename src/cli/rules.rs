use comfy_table::{Cell, Table};

use asset_tracker::canonical::canonicalize;
use asset_tracker::error::Result;
use asset_tracker::settings::load_settings;

pub fn list() -> Result<()> {
    let rules = load_settings().rule_set()?;

    let mut table = Table::new();
    table.set_header(vec!["#", "Match", "Key / Pattern", "Major", "Sub", "Display Name"]);
    for (i, rule) in rules.rules().iter().enumerate() {
        let (kind, text) = rule.matcher.describe();
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(kind),
            Cell::new(text),
            Cell::new(&rule.major_category),
            Cell::new(&rule.sub_category),
            Cell::new(rule.display_name.as_deref().unwrap_or_default()),
        ]);
    }
    println!("Classification rules (first match wins)\n{table}");
    Ok(())
}

pub fn canonicalize_names(names: &[String]) -> Result<()> {
    for name in names {
        println!("{}\t{}", name, canonicalize(name.as_str()));
    }
    Ok(())
}
