//! Remote API access: the trait the sync engine talks to, its HTTP
//! implementation, and the followed-ids pager.

mod auth;
mod client;
mod followed;

pub use auth::{basic_credentials, BearerToken};
pub use client::HttpApiClient;
pub use followed::FollowedIds;

use crate::error::Result;
use crate::models::{RawPost, User};

/// Maximum number of posts the remote returns for one timeline request
pub const TIMELINE_PAGE_SIZE: usize = 200;

/// Maximum number of ids accepted by one user lookup request
pub const LOOKUP_BATCH_SIZE: usize = 100;

/// One timeline response for an id window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Up to [`TIMELINE_PAGE_SIZE`] posts, newest first
    Posts(Vec<RawPost>),
    /// The owner's timeline is restricted; treat as "nothing available"
    AccessDenied,
}

/// Position in the followed-ids listing.
///
/// The wire protocol uses `-1` for the first request and `0` for "no more
/// pages"; both are kept off the public surface so a real id can never be
/// mistaken for a terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Start,
    Next(i64),
    Exhausted,
}

impl Cursor {
    /// Interpret a `next_cursor` value from a response
    pub const fn from_next_cursor(raw: i64) -> Self {
        if raw == 0 {
            Self::Exhausted
        } else {
            Self::Next(raw)
        }
    }

    /// Value to send as the `cursor` query parameter, `None` once exhausted
    pub const fn to_query(self) -> Option<i64> {
        match self {
            Self::Start => Some(-1),
            Self::Next(raw) => Some(raw),
            Self::Exhausted => None,
        }
    }
}

/// One page of followed ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdsPage {
    pub ids: Vec<i64>,
    pub next: Cursor,
}

/// Read endpoints the sync engine and resolver depend on
#[allow(async_fn_in_trait)]
pub trait RemoteApi {
    /// Posts by `owner_id` with `since_id < id <= max_id`, newest first.
    ///
    /// `None` leaves that side of the window open.
    async fn fetch_page(
        &self,
        owner_id: i64,
        since_id: Option<i64>,
        max_id: Option<i64>,
    ) -> Result<Page>;

    /// Resolve up to [`LOOKUP_BATCH_SIZE`] ids to users. Unknown ids are omitted.
    async fn lookup_users(&self, ids: &[i64]) -> Result<Vec<User>>;

    /// One page of the ids followed by `handle`
    async fn followed_ids_page(&self, handle: &str, cursor: Cursor) -> Result<IdsPage>;
}
