//! Incremental timeline sync for a single owner.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::api::{Page, RemoteApi};
use crate::config::SyncSettings;
use crate::db::Store;
use crate::error::Result;
use crate::models::Post;

/// Limits applied to one `sync_until` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Owners whose newest stored post is younger than this are served from the store
    pub min_refresh_interval: Duration,
    /// Stop paging once this much wall time has passed
    pub deadline: Option<Duration>,
    /// Stop paging after this many page requests
    pub max_requests: Option<usize>,
}

impl SyncOptions {
    pub const fn new(min_refresh_interval: Duration) -> Self {
        Self {
            min_refresh_interval,
            deadline: None,
            max_requests: None,
        }
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub const fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = Some(max_requests);
        self
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            min_refresh_interval: settings.min_refresh_interval,
            deadline: settings.owner_deadline,
            max_requests: settings.max_pages_per_owner,
        }
    }
}

/// Result of syncing one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Every stored post by the owner, newest id first
    pub posts: Vec<Post>,
    /// Page requests issued
    pub requests: usize,
    /// Posts newly written to the store
    pub inserted: usize,
    /// False when a deadline or request budget cut paging short
    pub complete: bool,
    /// True when the store was fresh enough that no request was made
    pub served_from_store: bool,
}

/// Pages an owner's timeline backwards until it reaches the cutoff or the
/// posts already stored.
pub struct SyncEngine<'a, S, R> {
    store: &'a S,
    remote: &'a R,
}

impl<'a, S: Store, R: RemoteApi> SyncEngine<'a, S, R> {
    pub const fn new(store: &'a S, remote: &'a R) -> Self {
        Self { store, remote }
    }

    /// Bring the stored timeline of `owner_id` up to date back to `cutoff`.
    ///
    /// Only posts created at or after `cutoff` are persisted. Paging stops at
    /// the first page with none of those, at an empty page, or when the
    /// window reaches the newest post already stored. Posts written before an
    /// error stay in the store; the error is returned.
    pub async fn sync_until(
        &self,
        owner_id: i64,
        cutoff: DateTime<Utc>,
        options: &SyncOptions,
    ) -> Result<SyncOutcome> {
        if self.is_fresh(owner_id, options.min_refresh_interval)? {
            tracing::debug!("Posts for {owner_id} are fresh; skipping remote calls");
            return Ok(SyncOutcome {
                posts: self.stored_posts(owner_id)?,
                requests: 0,
                inserted: 0,
                complete: true,
                served_from_store: true,
            });
        }

        let started = Instant::now();
        let since_id = self.store.watermark(owner_id)?;
        let mut max_id = None;
        let mut requests = 0;
        let mut inserted = 0;
        let mut complete = true;

        loop {
            if options.max_requests.is_some_and(|limit| requests >= limit)
                || options.deadline.is_some_and(|limit| started.elapsed() >= limit)
            {
                tracing::warn!(
                    "Stopped paging {owner_id} after {requests} requests; older posts may be missing"
                );
                complete = false;
                break;
            }

            let page = self.remote.fetch_page(owner_id, since_id, max_id).await?;
            requests += 1;

            let posts = match page {
                Page::AccessDenied => {
                    tracing::info!("Timeline of {owner_id} is not accessible");
                    break;
                }
                Page::Posts(posts) => posts,
            };

            // Posts outside the requested window are ignored
            let returned = posts.len();
            let posts = posts
                .into_iter()
                .filter(|post| in_window(post.id, since_id, max_id))
                .collect::<Vec<_>>();
            if posts.len() < returned {
                tracing::warn!(
                    "Dropped {} posts for {owner_id} outside the requested window",
                    returned - posts.len()
                );
            }

            let Some(min_id) = posts.iter().map(|post| post.id).min() else {
                break;
            };

            let seen_at = Utc::now();
            let mut qualifying = 0;
            for raw in posts {
                if raw.created_at < cutoff {
                    continue;
                }
                qualifying += 1;
                let post = raw.into_post(owner_id, seen_at);
                if self.store.put_post(&post)?.is_inserted() {
                    inserted += 1;
                    tracing::trace!(
                        "New post {} by {owner_id}: {}",
                        post.id,
                        post.text().unwrap_or_default()
                    );
                }
            }
            tracing::debug!("Page {requests} for {owner_id}: {qualifying} posts since {cutoff}");

            if qualifying == 0 {
                break;
            }

            // Every kept id is at most max_id, so the window strictly shrinks
            let next_max = min_id.saturating_sub(1);
            if since_id.is_some_and(|since| next_max <= since)
                || max_id.is_some_and(|previous| next_max >= previous)
            {
                break;
            }
            max_id = Some(next_max);
        }

        Ok(SyncOutcome {
            posts: self.stored_posts(owner_id)?,
            requests,
            inserted,
            complete,
            served_from_store: false,
        })
    }

    fn is_fresh(&self, owner_id: i64, interval: Duration) -> Result<bool> {
        let Some(latest) = self.store.latest_inserted_post(owner_id)? else {
            return Ok(false);
        };
        // A first_seen_at in the future means the clock moved back; count it as fresh
        Ok(match (Utc::now() - latest.first_seen_at).to_std() {
            Ok(age) => age < interval,
            Err(_) => true,
        })
    }

    fn stored_posts(&self, owner_id: i64) -> Result<Vec<Post>> {
        self.store
            .posts_by(owner_id, DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// `since_id < id <= max_id`, with `None` leaving that side open
fn in_window(id: i64, since_id: Option<i64>, max_id: Option<i64>) -> bool {
    !since_id.is_some_and(|since| id <= since) && !max_id.is_some_and(|max| id > max)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::db::{Database, SqliteStore};
    use crate::models::RawPost;
    use crate::sync::testing::{raw_post, FakeRemote};
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;

    const OWNER: i64 = 42;

    fn always_refresh() -> SyncOptions {
        SyncOptions::new(Duration::ZERO)
    }

    /// `count` posts ending at id `newest`, one minute apart, newest created at `now`
    fn history(now: DateTime<Utc>, newest: i64, count: i64) -> Vec<RawPost> {
        (0..count)
            .map(|age| raw_post(newest - age, now - TimeDelta::minutes(age)))
            .collect()
    }

    fn ids(posts: &[Post]) -> BTreeSet<i64> {
        posts.iter().map(|post| post.id).collect()
    }

    #[tokio::test]
    async fn syncs_small_timeline_into_empty_store() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        let remote = FakeRemote::default().with_timeline(
            OWNER,
            vec![raw_post(1, now), raw_post(2, now), raw_post(3, now)],
        );

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(OWNER, now - TimeDelta::days(1), &always_refresh())
            .await
            .unwrap();

        assert_eq!(outcome.posts.len(), 3);
        assert_eq!(outcome.inserted, 3);
        assert!(outcome.complete);
        assert_eq!(store.latest_post_id(OWNER).unwrap(), 3);
        assert_eq!(remote.page_calls.borrow()[0], (OWNER, None, None));
    }

    #[tokio::test]
    async fn pages_past_first_page_until_cutoff() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        let remote = FakeRemote::default().with_timeline(OWNER, history(now, 1449, 450));

        // ids 1100..=1449 are within the window
        let cutoff = now - TimeDelta::minutes(349);
        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(OWNER, cutoff, &always_refresh())
            .await
            .unwrap();

        assert_eq!(outcome.posts.len(), 350);
        assert_eq!(ids(&outcome.posts), (1100..=1449).collect::<BTreeSet<_>>());
        assert_eq!(outcome.requests, 3);
        assert!(outcome.complete);
        assert_eq!(
            *remote.page_calls.borrow(),
            vec![
                (OWNER, None, None),
                (OWNER, None, Some(1249)),
                (OWNER, None, Some(1049)),
            ]
        );
    }

    #[tokio::test]
    async fn second_sync_only_requests_newer_posts() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        let cutoff = now - TimeDelta::days(1);

        let first = FakeRemote::default().with_timeline(OWNER, history(now, 300, 250));
        SyncEngine::new(&store, &first)
            .sync_until(OWNER, cutoff, &always_refresh())
            .await
            .unwrap();
        assert_eq!(store.watermark(OWNER).unwrap(), Some(300));

        let second = FakeRemote::default().with_timeline(OWNER, history(now, 310, 260));
        let outcome = SyncEngine::new(&store, &second)
            .sync_until(OWNER, cutoff, &always_refresh())
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 10);
        assert_eq!(outcome.posts.len(), 260);
        assert_eq!(outcome.requests, 1);
        assert_eq!(second.page_calls.borrow()[0], (OWNER, Some(300), None));
        assert_eq!(store.watermark(OWNER).unwrap(), Some(310));
    }

    #[tokio::test]
    async fn fresh_store_makes_no_remote_calls() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        store
            .put_post(&raw_post(5, now).into_post(OWNER, now - TimeDelta::minutes(10)))
            .unwrap();
        let remote = FakeRemote::default().with_timeline(OWNER, history(now, 50, 10));

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(
                OWNER,
                now - TimeDelta::days(1),
                &SyncOptions::new(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        assert!(outcome.served_from_store);
        assert_eq!(remote.page_call_count(), 0);
        assert_eq!(ids(&outcome.posts), BTreeSet::from([5]));
    }

    #[tokio::test]
    async fn stale_store_is_refreshed() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        store
            .put_post(&raw_post(5, now).into_post(OWNER, now - TimeDelta::hours(2)))
            .unwrap();
        let remote = FakeRemote::default().with_timeline(OWNER, history(now, 8, 8));

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(
                OWNER,
                now - TimeDelta::days(1),
                &SyncOptions::new(Duration::from_secs(3600)),
            )
            .await
            .unwrap();

        assert!(!outcome.served_from_store);
        assert_eq!(remote.page_calls.borrow()[0], (OWNER, Some(5), None));
        assert_eq!(ids(&outcome.posts), BTreeSet::from([5, 6, 7, 8]));
    }

    #[tokio::test]
    async fn access_denied_yields_nothing() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let remote = FakeRemote::default().with_denied(OWNER);

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(OWNER, Utc::now() - TimeDelta::days(1), &always_refresh())
            .await
            .unwrap();

        assert!(outcome.posts.is_empty());
        assert_eq!(outcome.requests, 1);
        assert!(outcome.complete);
    }

    #[tokio::test]
    async fn failure_keeps_posts_from_earlier_pages() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        let remote = FakeRemote::default()
            .with_timeline(OWNER, history(now, 1449, 450))
            .failing_on_page(2);

        let result = SyncEngine::new(&store, &remote)
            .sync_until(OWNER, now - TimeDelta::days(1), &always_refresh())
            .await;

        assert!(result.is_err());
        let stored = store.posts_by(OWNER, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert_eq!(ids(&stored), (1250..=1449).collect::<BTreeSet<_>>());
    }

    #[tokio::test]
    async fn request_budget_marks_outcome_incomplete() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        let remote = FakeRemote::default().with_timeline(OWNER, history(now, 1449, 450));

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(
                OWNER,
                now - TimeDelta::days(1),
                &always_refresh().with_max_requests(1),
            )
            .await
            .unwrap();

        assert!(!outcome.complete);
        assert_eq!(outcome.requests, 1);
        assert_eq!(outcome.posts.len(), 200);
    }

    #[tokio::test]
    async fn old_posts_are_not_persisted() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        let remote = FakeRemote::default().with_timeline(
            OWNER,
            vec![raw_post(10, now), raw_post(9, now - TimeDelta::days(30))],
        );

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(OWNER, now - TimeDelta::days(7), &always_refresh())
            .await
            .unwrap();

        assert_eq!(ids(&outcome.posts), BTreeSet::from([10]));
        assert!(store.get_post(9).unwrap().is_none());
    }

    #[tokio::test]
    async fn remote_ignoring_window_does_not_loop() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        let remote = FakeRemote::default()
            .with_timeline(OWNER, vec![raw_post(20, now), raw_post(10, now)])
            .ignoring_window();

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(OWNER, now - TimeDelta::days(1), &always_refresh())
            .await
            .unwrap();

        assert_eq!(outcome.requests, 2);
        assert!(outcome.complete);
        assert_eq!(ids(&outcome.posts), BTreeSet::from([10, 20]));
        assert_eq!(remote.page_calls.borrow()[1], (OWNER, None, Some(9)));
    }

    #[tokio::test]
    async fn posts_above_watermark_window_are_not_stored_twice() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteStore::new(db.connection());
        let now = Utc::now();
        store
            .put_post(&raw_post(10, now).into_post(OWNER, now - TimeDelta::hours(2)))
            .unwrap();
        let remote = FakeRemote::default()
            .with_timeline(OWNER, vec![raw_post(12, now), raw_post(10, now), raw_post(7, now)])
            .ignoring_window();

        let outcome = SyncEngine::new(&store, &remote)
            .sync_until(OWNER, now - TimeDelta::days(1), &always_refresh())
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.requests, 2);
        assert_eq!(ids(&outcome.posts), BTreeSet::from([10, 12]));
    }

    #[test]
    fn options_from_settings_carry_paging_limits() {
        let settings = SyncSettings {
            owner_deadline: Some(Duration::from_secs(30)),
            max_pages_per_owner: Some(3),
            ..SyncSettings::default()
        };

        let options = SyncOptions::from(&settings);

        assert_eq!(options.deadline, Some(Duration::from_secs(30)));
        assert_eq!(options.max_requests, Some(3));
        assert_eq!(options.min_refresh_interval, settings.min_refresh_interval);
    }
}
