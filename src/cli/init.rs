use std::path::PathBuf;

use asset_tracker::db::{get_connection, init_db, DB_FILE};
use asset_tracker::error::Result;
use asset_tracker::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    // Reject an unusable rules section before saving.
    settings.rule_set()?;
    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;

    let conn = get_connection(&resolved.join(DB_FILE))?;
    init_db(&conn)?;

    println!("Initialized asset-tracker at {}", resolved.display());
    Ok(())
}
