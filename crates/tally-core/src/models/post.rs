//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used by the remote API, e.g. `Wed Aug 27 13:08:45 +0000 2008`
const REMOTE_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// A post as handed back by the remote page fetcher, before it is owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost {
    /// Remote post id (monotonically increasing with creation time)
    pub id: i64,
    /// When the author published it
    pub created_at: DateTime<Utc>,
    /// The full remote record, serialized as JSON
    pub payload: String,
}

impl RawPost {
    /// Parse a single timeline entry from the remote JSON representation.
    pub fn from_json(value: &serde_json::Value) -> crate::Result<Self> {
        let id = value
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| crate::Error::InvalidInput("timeline entry without id".into()))?;
        let created_at = value
            .get("created_at")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                crate::Error::InvalidInput(format!("timeline entry {id} without created_at"))
            })
            .and_then(parse_remote_timestamp)?;

        Ok(Self {
            id,
            created_at,
            payload: value.to_string(),
        })
    }

    /// Attach ownership and the insert timestamp.
    #[must_use]
    pub fn into_post(self, owner_id: i64, first_seen_at: DateTime<Utc>) -> Post {
        Post {
            id: self.id,
            owner_id,
            created_at: self.created_at,
            first_seen_at,
            payload: self.payload,
        }
    }
}

/// A stored post. Immutable once persisted: the first write for an id wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Globally unique remote id
    pub id: i64,
    /// Account that published the post
    pub owner_id: i64,
    /// Publication time
    pub created_at: DateTime<Utc>,
    /// When this process first stored the post
    pub first_seen_at: DateTime<Utc>,
    /// Opaque serialized remote record
    pub payload: String,
}

impl Post {
    /// Create a post first seen now
    #[must_use]
    pub fn new(
        id: i64,
        owner_id: i64,
        created_at: DateTime<Utc>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id,
            owner_id,
            created_at,
            first_seen_at: Utc::now(),
            payload: payload.into(),
        }
    }

    /// Body text pulled from the payload, if the payload carries one
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.payload).ok()?;
        value
            .get("full_text")
            .or_else(|| value.get("text"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
    }
}

/// Parse the remote API's `created_at` layout into UTC.
pub fn parse_remote_timestamp(raw: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), REMOTE_TIMESTAMP_FORMAT)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| crate::Error::InvalidInput(format!("bad timestamp '{raw}': {error}")))
}
