use std::path::Path;

use chrono::Utc;
use tally_core::db::SqliteStore;
use tally_core::report::WeeklyReport;

use crate::commands::common::{normalize_handle, open_existing_store};
use crate::error::CliError;

pub fn run_stats(handle: &str, as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let handle = normalize_handle(handle)?;
    let db = open_existing_store(data_dir, &handle)?;
    let store = SqliteStore::new(db.connection());

    let report = WeeklyReport::build(&store, Utc::now().date_naive())?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.rows.is_empty() {
        println!("No users recorded for {handle}.");
    } else {
        println!("{}", report.render_table());
    }
    Ok(())
}
