// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-concurrency background quota refresh: ensures the token is fresh,
//! fetches the backend quota endpoint, persists the snapshot, and feeds it
//! into the threshold tracker. Single-flight per identity via a TTL map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

use crate::account::store::AccountStore;
use crate::account::AuthMode;
use crate::oauth::refresher::OAuthRefresher;
use crate::quota::store::SnapshotStore;
use crate::quota::tracker::{Crossing, TrackerState};
use crate::rate_limit::QuotaSnapshot;

const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_REFRESH_TTL_MS: u64 = 60_000;

/// Fetches a fresh [`QuotaSnapshot`] for one account from the backend's
/// dedicated quota endpoint. Implemented by the HTTP transport in
/// production; trivially fakeable in tests.
#[async_trait::async_trait]
pub trait QuotaFetcher: Send + Sync {
    async fn fetch(&self, access_token: &str, account_id: Option<&str>) -> anyhow::Result<QuotaSnapshot>;
}

pub struct QuotaRefreshCoordinator {
    semaphore: Arc<Semaphore>,
    next_refresh_at: Mutex<HashMap<String, u64>>,
    trackers: Mutex<HashMap<String, TrackerState>>,
    refresh_ttl_ms: u64,
}

impl QuotaRefreshCoordinator {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            next_refresh_at: Mutex::new(HashMap::new()),
            trackers: Mutex::new(HashMap::new()),
            refresh_ttl_ms: DEFAULT_REFRESH_TTL_MS,
        }
    }

    #[cfg(test)]
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            next_refresh_at: Mutex::new(HashMap::new()),
            trackers: Mutex::new(HashMap::new()),
            refresh_ttl_ms: DEFAULT_REFRESH_TTL_MS,
        }
    }

    /// True if `identity_key` is due for a refresh (absent from the TTL map,
    /// or past its `next_refresh_at`), without claiming the slot.
    pub async fn is_stale(&self, identity_key: &str, now: u64) -> bool {
        let map = self.next_refresh_at.lock().await;
        map.get(identity_key).is_none_or(|&next| now >= next)
    }

    /// Refresh one account's quota snapshot if stale, respecting the bounded
    /// concurrency limit. Returns `None` if it was not stale or another
    /// caller is already refreshing it; single-flight is implied by the TTL
    /// map being updated before the network call completes.
    #[allow(clippy::too_many_arguments)]
    pub async fn maybe_refresh(
        &self,
        fetcher: &dyn QuotaFetcher,
        account_store: &AccountStore,
        refresher: &OAuthRefresher,
        snapshots: &SnapshotStore,
        identity_key: &str,
        token_url: &str,
        client_id: &str,
        now: u64,
    ) -> anyhow::Result<Option<Vec<Crossing>>> {
        {
            let mut map = self.next_refresh_at.lock().await;
            if map.get(identity_key).is_some_and(|&next| now < next) {
                return Ok(None);
            }
            map.insert(identity_key.to_owned(), now + self.refresh_ttl_ms);
        }

        let _permit = self.semaphore.acquire().await?;

        let access_token = match account_store
            .list(AuthMode::Native)
            .into_iter()
            .chain(account_store.list(AuthMode::Codex))
            .find(|a| a.identity_key == identity_key)
        {
            Some(account) if !account.is_cooling_down(now) && !account.is_lease_held(now) => {
                account.access
            }
            Some(_) => return Ok(None),
            None => return Ok(None),
        };

        // Opportunistically ensure the token is fresh before the quota call;
        // a lease collision just means another caller is already doing it.
        let _ = refresher.refresh(account_store, identity_key, token_url, client_id, now).await;

        let account_id = account_store
            .list(AuthMode::Native)
            .into_iter()
            .chain(account_store.list(AuthMode::Codex))
            .find(|a| a.identity_key == identity_key)
            .and_then(|a| a.account_id);

        let snapshot = fetcher.fetch(&access_token, account_id.as_deref()).await?;
        snapshots.put(identity_key, snapshot.clone()).await?;

        let mut trackers = self.trackers.lock().await;
        let tracker = trackers.entry(identity_key.to_owned()).or_default();
        Ok(Some(tracker.observe(&snapshot)))
    }
}

impl Default for QuotaRefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
