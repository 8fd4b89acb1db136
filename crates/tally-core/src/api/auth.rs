//! Application-only bearer token exchange (OAuth2 client credentials).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::client::parse_api_error;
use crate::config::{ApiConfig, Credentials};
use crate::error::{Error, Result};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Bearer token issued for this process
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::Credentials("bearer token must not be empty".into()));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_tuple("BearerToken")
            .field(&"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: Option<String>,
    access_token: Option<String>,
}

/// `Basic` credential for the token endpoint: base64 of the url-encoded
/// `key:secret` pair.
pub fn basic_credentials(credentials: &Credentials) -> String {
    let key = urlencoding::encode(credentials.key.trim());
    let secret = urlencoding::encode(credentials.secret.trim());
    STANDARD.encode(format!("{key}:{secret}"))
}

/// Trade the application key pair for a bearer token.
pub(super) async fn exchange_token(
    client: &Client,
    config: &ApiConfig,
    credentials: &Credentials,
) -> Result<BearerToken> {
    let response = client
        .post(format!("{}/token", config.oauth_base_url))
        .header(
            reqwest::header::AUTHORIZATION,
            format!("Basic {}", basic_credentials(credentials)),
        )
        .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
        .body("grant_type=client_credentials")
        .send()
        .await?;

    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Credentials(format!(
            "failed to get authentication token: {} (HTTP {})",
            parse_api_error(&body),
            status.as_u16()
        )));
    }

    let payload = response.json::<TokenResponse>().await?;
    token_from_response(payload)
}

fn token_from_response(payload: TokenResponse) -> Result<BearerToken> {
    if let Some(kind) = payload.token_type.as_deref() {
        if !kind.eq_ignore_ascii_case("bearer") {
            return Err(Error::Credentials(format!(
                "unexpected token type '{kind}'"
            )));
        }
    }

    let token = payload.access_token.ok_or_else(|| {
        Error::Credentials("token response did not include access_token".into())
    })?;
    BearerToken::new(token)
}
