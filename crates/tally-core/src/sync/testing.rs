//! In-memory remote used by the sync, resolver and pager tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::api::{Cursor, IdsPage, Page, RemoteApi, TIMELINE_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::models::{RawPost, User};

/// Arguments of one `fetch_page` call
pub type PageCall = (i64, Option<i64>, Option<i64>);

#[derive(Default)]
pub struct FakeRemote {
    timelines: HashMap<i64, Vec<RawPost>>,
    denied: HashSet<i64>,
    fail_on_page: Option<usize>,
    fail_on_lookup: Option<usize>,
    missing_users: HashSet<i64>,
    followed: Vec<i64>,
    followed_page_size: usize,
    ignore_window: bool,
    pub page_calls: RefCell<Vec<PageCall>>,
    pub lookup_calls: RefCell<Vec<Vec<i64>>>,
}

pub fn raw_post(id: i64, created_at: DateTime<Utc>) -> RawPost {
    RawPost {
        id,
        created_at,
        payload: format!(r#"{{"id":{id},"text":"post {id}"}}"#),
    }
}

impl FakeRemote {
    pub fn with_timeline(mut self, owner_id: i64, posts: Vec<RawPost>) -> Self {
        self.timelines.entry(owner_id).or_default().extend(posts);
        self
    }

    pub fn with_denied(mut self, owner_id: i64) -> Self {
        self.denied.insert(owner_id);
        self
    }

    /// Make the n-th (1-based) timeline request fail with a server error
    pub const fn failing_on_page(mut self, request: usize) -> Self {
        self.fail_on_page = Some(request);
        self
    }

    /// Make the n-th (1-based) lookup request fail with a server error
    pub const fn failing_on_lookup(mut self, request: usize) -> Self {
        self.fail_on_lookup = Some(request);
        self
    }

    /// Serve the newest page regardless of the requested `since_id`/`max_id`
    pub const fn ignoring_window(mut self) -> Self {
        self.ignore_window = true;
        self
    }

    pub fn with_missing_user(mut self, id: i64) -> Self {
        self.missing_users.insert(id);
        self
    }

    pub fn with_followed(mut self, ids: Vec<i64>, page_size: usize) -> Self {
        self.followed = ids;
        self.followed_page_size = page_size;
        self
    }

    pub fn page_call_count(&self) -> usize {
        self.page_calls.borrow().len()
    }
}

fn server_error() -> Error {
    Error::Transport {
        status: 503,
        message: "Over capacity (code 130)".to_string(),
    }
}

impl RemoteApi for FakeRemote {
    async fn fetch_page(
        &self,
        owner_id: i64,
        since_id: Option<i64>,
        max_id: Option<i64>,
    ) -> Result<Page> {
        self.page_calls
            .borrow_mut()
            .push((owner_id, since_id, max_id));

        if self.fail_on_page == Some(self.page_calls.borrow().len()) {
            return Err(server_error());
        }
        if self.denied.contains(&owner_id) {
            return Ok(Page::AccessDenied);
        }

        let (since_id, max_id) = if self.ignore_window {
            (None, None)
        } else {
            (since_id, max_id)
        };
        let mut posts = self
            .timelines
            .get(&owner_id)
            .map(|posts| {
                posts
                    .iter()
                    .filter(|post| !since_id.is_some_and(|since| post.id <= since))
                    .filter(|post| !max_id.is_some_and(|max| post.id > max))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        posts.truncate(TIMELINE_PAGE_SIZE);
        Ok(Page::Posts(posts))
    }

    async fn lookup_users(&self, ids: &[i64]) -> Result<Vec<User>> {
        self.lookup_calls.borrow_mut().push(ids.to_vec());

        if self.fail_on_lookup == Some(self.lookup_calls.borrow().len()) {
            return Err(server_error());
        }

        Ok(ids
            .iter()
            .filter(|id| !self.missing_users.contains(id))
            .map(|&id| User::new(id, format!("user{id}")))
            .collect())
    }

    async fn followed_ids_page(&self, _handle: &str, cursor: Cursor) -> Result<IdsPage> {
        let start = match cursor {
            Cursor::Start => 0,
            Cursor::Next(offset) => usize::try_from(offset).unwrap_or(usize::MAX),
            Cursor::Exhausted => {
                return Ok(IdsPage {
                    ids: Vec::new(),
                    next: Cursor::Exhausted,
                })
            }
        };

        let start = start.min(self.followed.len());
        let end = (start + self.followed_page_size.max(1)).min(self.followed.len());
        let next = if end < self.followed.len() {
            Cursor::Next(i64::try_from(end).unwrap_or(i64::MAX))
        } else {
            Cursor::Exhausted
        };

        Ok(IdsPage {
            ids: self.followed[start..end].to_vec(),
            next,
        })
    }
}
