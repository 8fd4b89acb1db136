use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_core::config::{non_empty, ApiConfig, Credentials, SyncSettings};
use tally_core::db::Database;

use crate::error::CliError;

const APP_DIR: &str = "tally";
const CREDENTIALS_FILE: &str = "credentials.json";

/// Trim a handle and drop a leading `@`; it names a file, so separators are rejected.
pub fn normalize_handle(raw: &str) -> Result<String, CliError> {
    let handle = raw.trim().trim_start_matches('@');
    if handle.is_empty() {
        return Err(CliError::EmptyHandle);
    }
    if handle
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_'))
    {
        return Err(CliError::InvalidHandle(handle.to_string()));
    }
    Ok(handle.to_string())
}

pub fn resolve_data_dir(
    cli_data_dir: Option<PathBuf>,
    env_data_dir: Option<OsString>,
) -> Result<PathBuf, CliError> {
    if let Some(dir) = cli_data_dir.or_else(|| env_data_dir.map(PathBuf::from)) {
        return Ok(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| CliError::Config("could not resolve a data directory".into()))
}

pub fn store_path(data_dir: &Path, handle: &str) -> PathBuf {
    data_dir.join(format!("{handle}.db"))
}

pub fn resolve_credentials_path(
    cli_path: Option<PathBuf>,
    env_path: Option<OsString>,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_path.or_else(|| env_path.map(PathBuf::from)) {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CREDENTIALS_FILE))
        .ok_or_else(|| CliError::Config("could not resolve a config directory".into()))
}

/// Credentials from the environment when both halves are set, otherwise from
/// the file with any single environment value layered on top.
pub fn load_credentials(
    path: &Path,
    env_key: Option<String>,
    env_secret: Option<String>,
) -> Result<Credentials, CliError> {
    let env_key = non_empty(env_key);
    let env_secret = non_empty(env_secret);
    if let (Some(key), Some(secret)) = (&env_key, &env_secret) {
        return Ok(Credentials::new(key.as_str(), secret.as_str())?);
    }

    Ok(Credentials::load_or_create_template(path)?.with_overrides(env_key, env_secret))
}

pub fn resolve_api_config(
    env_api_url: Option<String>,
    env_oauth_url: Option<String>,
) -> Result<ApiConfig, CliError> {
    let defaults = ApiConfig::default();
    match (non_empty(env_api_url), non_empty(env_oauth_url)) {
        (None, None) => Ok(defaults),
        (api, oauth) => Ok(ApiConfig::with_base_urls(
            api.unwrap_or(defaults.api_base_url),
            oauth.unwrap_or(defaults.oauth_base_url),
        )?),
    }
}

/// Per-run sync limits taken from `fetch` flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncLimits {
    pub refresh_minutes: Option<u64>,
    pub days: Option<u32>,
    pub owner_timeout_secs: Option<u64>,
    pub max_pages: Option<usize>,
}

pub fn resolve_sync_settings(limits: SyncLimits) -> SyncSettings {
    let defaults = SyncSettings::default();
    SyncSettings {
        min_refresh_interval: limits
            .refresh_minutes
            .map_or(defaults.min_refresh_interval, |minutes| {
                Duration::from_secs(minutes.saturating_mul(60))
            }),
        lookback_days: limits.days.unwrap_or(defaults.lookback_days),
        owner_deadline: limits
            .owner_timeout_secs
            .map(Duration::from_secs)
            .or(defaults.owner_deadline),
        max_pages_per_owner: limits.max_pages.or(defaults.max_pages_per_owner),
    }
}

/// Open the store for an existing handle without creating a new one.
pub fn open_existing_store(data_dir: &Path, handle: &str) -> Result<Database, CliError> {
    let path = store_path(data_dir, handle);
    if !path.exists() {
        return Err(CliError::NoData(handle.to_string()));
    }
    Ok(Database::open(&path)?)
}
