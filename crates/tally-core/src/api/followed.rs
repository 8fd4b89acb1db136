//! Lazy pager over the followed-ids listing

use super::{Cursor, RemoteApi};
use crate::error::Result;

/// Restartable sequence of followed-id batches for one handle.
pub struct FollowedIds<'a, R> {
    api: &'a R,
    handle: String,
    cursor: Cursor,
    pages: usize,
}

impl<'a, R: RemoteApi> FollowedIds<'a, R> {
    pub fn new(api: &'a R, handle: impl Into<String>) -> Self {
        Self {
            api,
            handle: handle.into(),
            cursor: Cursor::Start,
            pages: 0,
        }
    }

    /// Fetch the next batch, or `None` once the listing is exhausted
    pub async fn next_batch(&mut self) -> Result<Option<Vec<i64>>> {
        if self.cursor == Cursor::Exhausted {
            return Ok(None);
        }

        let page = self.api.followed_ids_page(&self.handle, self.cursor).await?;
        self.pages += 1;
        tracing::debug!(
            "Followed ids page {} for {}: {} ids",
            self.pages,
            self.handle,
            page.ids.len()
        );
        self.cursor = page.next;
        Ok(Some(page.ids))
    }

    /// Start over from the first page
    pub fn restart(&mut self) {
        self.cursor = Cursor::Start;
        self.pages = 0;
    }

    /// Number of pages fetched since the last (re)start
    pub const fn pages(&self) -> usize {
        self.pages
    }

    /// Drain every remaining batch into one list
    pub async fn collect_all(&mut self) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            ids.extend(batch);
        }
        Ok(ids)
    }
}
