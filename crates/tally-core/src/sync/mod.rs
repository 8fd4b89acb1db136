//! Keeping the local store in step with the remote: per-owner timeline sync,
//! user resolution, and the fetch run that drives both.

mod engine;
mod resolver;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{SyncEngine, SyncOptions, SyncOutcome};
pub use resolver::{ResolveOutcome, UnknownUserResolver};

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};

use crate::api::{FollowedIds, RemoteApi};
use crate::config::SyncSettings;
use crate::db::Store;
use crate::error::Result;

/// Totals for one fetch run over every followed account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Followed accounts visited
    pub owners: usize,
    /// Users added to the store
    pub new_users: usize,
    /// Posts added to the store
    pub new_posts: usize,
    /// Timeline page requests issued
    pub requests: usize,
    /// Owners served from the store without a request
    pub served_from_store: usize,
    /// Owners whose paging was cut short by a budget
    pub incomplete: usize,
}

/// Fetch the accounts `handle` follows, record any new ones, and sync each
/// timeline back `settings.lookback_days` from `now`.
///
/// The first error aborts the run; work stored up to that point is kept.
pub async fn refresh_followed<S: Store, R: RemoteApi>(
    store: &S,
    remote: &R,
    handle: &str,
    settings: &SyncSettings,
    now: DateTime<Utc>,
) -> Result<RefreshSummary> {
    tracing::info!("Updating posts for accounts followed by {handle}");

    let mut seen = HashSet::new();
    let followed = FollowedIds::new(remote, handle)
        .collect_all()
        .await?
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect::<Vec<_>>();
    tracing::info!("{handle} follows {} accounts", followed.len());

    let resolved = UnknownUserResolver::new(store, remote)
        .resolve(&followed)
        .await?;

    let cutoff = now
        .checked_sub_signed(TimeDelta::days(i64::from(settings.lookback_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let options = SyncOptions::from(settings);
    let engine = SyncEngine::new(store, remote);
    let mut summary = RefreshSummary {
        new_users: resolved.inserted,
        ..RefreshSummary::default()
    };

    for owner_id in followed {
        let name = store
            .get_user(owner_id)?
            .map_or_else(|| owner_id.to_string(), |user| user.display_name);
        tracing::info!("Getting posts for {name}:{owner_id}");

        let outcome = engine.sync_until(owner_id, cutoff, &options).await?;
        tracing::debug!(
            "{name}: {} new posts, {} stored, {} requests",
            outcome.inserted,
            outcome.posts.len(),
            outcome.requests
        );

        summary.owners += 1;
        summary.new_posts += outcome.inserted;
        summary.requests += outcome.requests;
        if outcome.served_from_store {
            summary.served_from_store += 1;
        }
        if !outcome.complete {
            summary.incomplete += 1;
        }
    }

    tracing::info!(
        "Saved {} new posts from {} accounts",
        summary.new_posts,
        summary.owners
    );
    Ok(summary)
}
