use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tally_core::api::HttpApiClient;
use tally_core::db::{Database, SqliteStore};
use tally_core::sync::refresh_followed;

use crate::commands::common::{
    load_credentials, normalize_handle, resolve_api_config, resolve_credentials_path,
    resolve_sync_settings, store_path, SyncLimits,
};
use crate::error::CliError;

pub struct FetchArgs {
    pub credentials: Option<PathBuf>,
    pub limits: SyncLimits,
}

pub async fn run_fetch(handle: &str, args: FetchArgs, data_dir: &Path) -> Result<(), CliError> {
    let handle = normalize_handle(handle)?;

    let credentials_path =
        resolve_credentials_path(args.credentials, env::var_os("TALLY_CREDENTIALS"))?;
    let credentials = load_credentials(
        &credentials_path,
        env::var("TALLY_API_KEY").ok(),
        env::var("TALLY_API_SECRET").ok(),
    )?;
    let config = resolve_api_config(
        env::var("TALLY_API_BASE_URL").ok(),
        env::var("TALLY_OAUTH_BASE_URL").ok(),
    )?;
    let settings = resolve_sync_settings(args.limits);

    let api = HttpApiClient::connect(config, &credentials).await?;

    let path = store_path(data_dir, &handle);
    let db = Database::open(&path)?;
    let store = SqliteStore::new(db.connection());
    tracing::debug!("Using store {}", path.display());

    let summary = refresh_followed(&store, &api, &handle, &settings, Utc::now()).await?;

    println!(
        "Synced {} accounts: {} new users, {} new posts ({} requests)",
        summary.owners, summary.new_users, summary.new_posts, summary.requests
    );
    if summary.served_from_store > 0 {
        println!(
            "{} accounts were refreshed recently and skipped",
            summary.served_from_store
        );
    }
    if summary.incomplete > 0 {
        println!(
            "{} accounts hit the paging limit; their older posts from this window \
             may be permanently missing (later runs only fetch newer posts)",
            summary.incomplete
        );
    }
    Ok(())
}
