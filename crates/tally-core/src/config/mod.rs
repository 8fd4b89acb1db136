//! Client configuration.
//!
//! Everything the remote client needs is passed in explicitly: endpoint
//! locations in [`ApiConfig`] and the application key pair in [`Credentials`].
//! Nothing here is process-global.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com/1.1";
const DEFAULT_OAUTH_BASE_URL: &str = "https://api.twitter.com/oauth2";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// Value written into a fresh credentials template; never accepted as a real key.
pub const CREDENTIALS_PLACEHOLDER: &str = "GET_YOUR_OWN";

/// Remote endpoint locations and transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// REST API root, e.g. `https://api.twitter.com/1.1`
    pub api_base_url: String,
    /// OAuth2 root used for the client-credentials exchange
    pub oauth_base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            oauth_base_url: DEFAULT_OAUTH_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ApiConfig {
    /// Point both endpoints at a different host (useful for proxies and local fakes)
    pub fn with_base_urls(
        api_base_url: impl Into<String>,
        oauth_base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url.into(), "api_base_url")?,
            oauth_base_url: normalize_base_url(oauth_base_url.into(), "oauth_base_url")?,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Application key pair for the client-credentials exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let credentials = Self {
            key: key.into(),
            secret: secret.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Load credentials from a JSON file.
    ///
    /// A missing file is replaced by a template holding placeholder values and
    /// the call fails, asking the user to fill the template in.
    pub fn load_or_create_template(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::write_template(path)?;
            return Err(Error::Credentials(format!(
                "no credentials found; created a template at {}. \
                 Create an application key/secret pair and place them there",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path)?;
        let credentials: Self = serde_json::from_str(&raw).map_err(|error| {
            Error::Credentials(format!("failed to parse {}: {error}", path.display()))
        })?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Replace the key and/or secret from the environment-style overrides.
    #[must_use]
    pub fn with_overrides(mut self, key: Option<String>, secret: Option<String>) -> Self {
        if let Some(key) = non_empty(key) {
            self.key = key;
        }
        if let Some(secret) = non_empty(secret) {
            self.secret = secret;
        }
        self
    }

    fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let template = Self {
            key: CREDENTIALS_PLACEHOLDER.to_string(),
            secret: CREDENTIALS_PLACEHOLDER.to_string(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&template)?)?;
        tracing::info!("Wrote credentials template to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [("key", &self.key), ("secret", &self.secret)] {
            let value = value.trim();
            if value.is_empty() {
                return Err(Error::Credentials(format!("{field} must not be empty")));
            }
            if value == CREDENTIALS_PLACEHOLDER {
                return Err(Error::Credentials(format!(
                    "{field} still holds the template placeholder"
                )));
            }
        }
        Ok(())
    }
}

/// Knobs for a fetch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Skip remote calls for an owner whose newest stored post was inserted
    /// less than this long ago
    pub min_refresh_interval: Duration,
    /// How many days back a fetch run must be complete
    pub lookback_days: u32,
    /// Upper bound on wall time spent paging a single owner
    pub owner_deadline: Option<Duration>,
    /// Upper bound on timeline requests for a single owner
    pub max_pages_per_owner: Option<usize>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            min_refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            owner_deadline: None,
            max_pages_per_owner: None,
        }
    }
}

/// Trimmed text, or `None` when nothing but whitespace was given.
///
/// Used for values that may come from environment variables, where an empty
/// assignment means "unset".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_base_url(raw: String, field: &str) -> Result<String> {
    let value = non_empty(Some(raw))
        .ok_or_else(|| Error::InvalidInput(format!("{field} must not be empty")))?;
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "{field} must include http:// or https://"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn with_base_urls_trims_trailing_slash() {
        let config =
            ApiConfig::with_base_urls("http://localhost:8080/1.1/", "http://localhost:8080/oauth2")
                .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080/1.1");
        assert_eq!(config.oauth_base_url, "http://localhost:8080/oauth2");
    }

    #[test]
    fn non_empty_treats_blank_as_unset() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" \t ".into())), None);
        assert_eq!(non_empty(Some(" key ".into())), Some("key".to_string()));
    }

    #[test]
    fn with_base_urls_rejects_missing_scheme() {
        assert!(ApiConfig::with_base_urls("api.example.com", "https://x").is_err());
        assert!(ApiConfig::with_base_urls("https://x", "  ").is_err());
    }

    #[test]
    fn missing_credentials_file_writes_template() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tally").join("credentials.json");

        let error = Credentials::load_or_create_template(&path).unwrap_err();
        assert!(error.to_string().contains("template"));
        assert!(path.exists());

        // The template itself is rejected until it is filled in
        let error = Credentials::load_or_create_template(&path).unwrap_err();
        assert!(error.to_string().contains("placeholder"));
    }

    #[test]
    fn load_credentials_from_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        std::fs::write(&path, r#"{"key":"abc","secret":"def"}"#).unwrap();

        let credentials = Credentials::load_or_create_template(&path).unwrap();
        assert_eq!(credentials.key, "abc");
        assert_eq!(credentials.secret, "def");
    }

    #[test]
    fn overrides_replace_non_empty_values_only() {
        let credentials = Credentials::new("abc", "def")
            .unwrap()
            .with_overrides(Some("  ".to_string()), Some("xyz".to_string()));
        assert_eq!(credentials.key, "abc");
        assert_eq!(credentials.secret, "xyz");
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let credentials = Credentials::new("abc", "top-secret").unwrap();
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
