//! HTTP implementation of [`RemoteApi`].

use std::collections::HashMap;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::auth::{exchange_token, BearerToken};
use super::{Cursor, IdsPage, Page, RemoteApi, LOOKUP_BATCH_SIZE, TIMELINE_PAGE_SIZE};
use crate::config::{ApiConfig, Credentials};
use crate::error::{Error, Result};
use crate::models::{RawPost, User};

const FOLLOWED_IDS_PAGE_SIZE: usize = 5000;
const ERROR_BODY_LIMIT: usize = 180;
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Resources checked before any sync work starts
const WATCHED_RESOURCES: [(&str, &str); 3] = [
    ("statuses", "/statuses/user_timeline"),
    ("users", "/users/lookup"),
    ("friends", "/friends/ids"),
];

/// Authenticated client for the remote REST API.
///
/// Construction performs the token exchange and a rate-limit health check, so
/// a value of this type is always ready to serve requests.
pub struct HttpApiClient {
    config: ApiConfig,
    client: Client,
    token: BearerToken,
}

impl HttpApiClient {
    /// Exchange credentials for a bearer token and verify the API is usable.
    pub async fn connect(config: ApiConfig, credentials: &Credentials) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let token = exchange_token(&client, &config, credentials).await?;
        tracing::debug!("Obtained bearer token from {}", config.oauth_base_url);

        let api = Self {
            config,
            client,
            token,
        };
        api.check_rate_limit().await?;
        Ok(api)
    }

    /// Fetch the rate-limit status and fail if any resource we rely on is spent.
    pub async fn check_rate_limit(&self) -> Result<()> {
        let resources = WATCHED_RESOURCES
            .iter()
            .map(|(family, _)| *family)
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .get(
                "application/rate_limit_status.json",
                &[("resources", resources)],
            )
            .await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&response));
        }
        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport {
                status: status.as_u16(),
                message: format!(
                    "could not get rate limit status: {}",
                    parse_api_error(&body)
                ),
            });
        }

        let status = response.json::<RateLimitStatus>().await?;
        if let Some((resource, window)) = status.exhausted() {
            tracing::warn!("Rate limit for {resource} is exhausted");
            return Err(Error::RateLimitExhausted {
                reset_at: Some(window.reset),
            });
        }
        Ok(())
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let response = self
            .client
            .get(format!("{}/{path}", self.config.api_base_url))
            .bearer_auth(self.token.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        Ok(response)
    }
}

impl RemoteApi for HttpApiClient {
    async fn fetch_page(
        &self,
        owner_id: i64,
        since_id: Option<i64>,
        max_id: Option<i64>,
    ) -> Result<Page> {
        let mut query = vec![
            ("user_id", owner_id.to_string()),
            ("count", TIMELINE_PAGE_SIZE.to_string()),
            ("trim_user", "true".to_string()),
        ];
        if let Some(since_id) = since_id {
            query.push(("since_id", since_id.to_string()));
        }
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id.to_string()));
        }

        let response = self.get("statuses/user_timeline.json", &query).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Timeline of {owner_id} is restricted; skipping");
            return Ok(Page::AccessDenied);
        }

        let entries = ensure_success(response)
            .await?
            .json::<Vec<serde_json::Value>>()
            .await?;
        let posts = entries
            .iter()
            .map(RawPost::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::Posts(posts))
    }

    async fn lookup_users(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > LOOKUP_BATCH_SIZE {
            return Err(Error::InvalidInput(format!(
                "user lookup accepts at most {LOOKUP_BATCH_SIZE} ids, got {}",
                ids.len()
            )));
        }

        let user_ids = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .get(
                "users/lookup.json",
                &[
                    ("user_id", user_ids),
                    ("include_entities", "false".to_string()),
                ],
            )
            .await?;

        // None of the requested ids exist anymore
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let users = ensure_success(response)
            .await?
            .json::<Vec<LookupUser>>()
            .await?;
        Ok(users.into_iter().map(Into::into).collect())
    }

    async fn followed_ids_page(&self, handle: &str, cursor: Cursor) -> Result<IdsPage> {
        let Some(raw_cursor) = cursor.to_query() else {
            return Ok(IdsPage {
                ids: Vec::new(),
                next: Cursor::Exhausted,
            });
        };

        let response = self
            .get(
                "friends/ids.json",
                &[
                    ("screen_name", handle.to_string()),
                    ("count", FOLLOWED_IDS_PAGE_SIZE.to_string()),
                    ("cursor", raw_cursor.to_string()),
                ],
            )
            .await?;

        let response = ensure_success(response).await.map_err(|error| match error {
            Error::Transport { status, message } => Error::Transport {
                status,
                message: format!("failed to get {handle}'s follows: {message}"),
            },
            other => other,
        })?;
        let payload = response.json::<FollowedIdsResponse>().await?;
        Ok(payload.into())
    }
}

/// Pass a success response through; turn anything else into the matching error.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(rate_limited(&response));
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Transport {
        status: status.as_u16(),
        message: parse_api_error(&body),
    })
}

fn rate_limited(response: &Response) -> Error {
    let reset_at = response
        .headers()
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok());
    Error::RateLimitExhausted { reset_at }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorEntry>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEntry {
    code: Option<i64>,
    message: Option<String>,
}

/// Best-effort human message from an error response body.
pub(super) fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(entry) = payload.errors.first() {
            let message = entry.message.as_deref().unwrap_or("unknown error").trim();
            return match entry.code {
                Some(code) => format!("{message} (code {code})"),
                None => message.to_string(),
            };
        }
        if let Some(error) = payload.error {
            return error.trim().to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(ERROR_BODY_LIMIT).collect()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
struct RateLimitWindow {
    remaining: u32,
    reset: i64,
}

#[derive(Debug, Deserialize)]
struct RateLimitStatus {
    #[serde(default)]
    resources: HashMap<String, HashMap<String, RateLimitWindow>>,
}

impl RateLimitStatus {
    fn exhausted(&self) -> Option<(&'static str, RateLimitWindow)> {
        WATCHED_RESOURCES.iter().find_map(|(family, resource)| {
            self.resources
                .get(*family)
                .and_then(|windows| windows.get(*resource))
                .filter(|window| window.remaining == 0)
                .map(|window| (*resource, *window))
        })
    }
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    id: i64,
    screen_name: String,
}

impl From<LookupUser> for User {
    fn from(value: LookupUser) -> Self {
        Self::new(value.id, value.screen_name)
    }
}

#[derive(Debug, Deserialize)]
struct FollowedIdsResponse {
    #[serde(default)]
    ids: Vec<i64>,
    #[serde(default)]
    next_cursor: i64,
}

impl From<FollowedIdsResponse> for IdsPage {
    fn from(value: FollowedIdsResponse) -> Self {
        Self {
            ids: value.ids,
            next: Cursor::from_next_cursor(value.next_cursor),
        }
    }
}
