//! Resolve user ids the store has not seen yet.

use std::collections::BTreeSet;

use crate::api::{RemoteApi, LOOKUP_BATCH_SIZE};
use crate::db::Store;
use crate::error::Result;

/// Summary of one resolve pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Candidate ids missing from the store before the pass
    pub unknown: usize,
    /// Users written to the store
    pub inserted: usize,
    /// Lookup requests issued
    pub lookups: usize,
}

pub struct UnknownUserResolver<'a, S, R> {
    store: &'a S,
    remote: &'a R,
}

impl<'a, S: Store, R: RemoteApi> UnknownUserResolver<'a, S, R> {
    pub const fn new(store: &'a S, remote: &'a R) -> Self {
        Self { store, remote }
    }

    /// Look up every candidate id the store lacks, in batches the remote accepts.
    ///
    /// Batches stored before a failing lookup are kept.
    pub async fn resolve(&self, candidates: &[i64]) -> Result<ResolveOutcome> {
        let candidates = candidates.iter().copied().collect::<BTreeSet<_>>();
        let unknown = self
            .store
            .unknown_ids(&candidates)?
            .into_iter()
            .collect::<Vec<_>>();

        let mut outcome = ResolveOutcome {
            unknown: unknown.len(),
            ..ResolveOutcome::default()
        };
        if unknown.is_empty() {
            return Ok(outcome);
        }
        tracing::info!("Looking up {} new users", unknown.len());

        for batch in unknown.chunks(LOOKUP_BATCH_SIZE) {
            let users = self.remote.lookup_users(batch).await?;
            outcome.lookups += 1;

            if users.len() < batch.len() {
                tracing::debug!(
                    "{} of {} ids in lookup batch no longer exist",
                    batch.len() - users.len(),
                    batch.len()
                );
            }
            for user in &users {
                if self.store.put_user(user)?.is_inserted() {
                    outcome.inserted += 1;
                }
            }
        }

        Ok(outcome)
    }
}
