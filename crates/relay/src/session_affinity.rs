// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sticky/hybrid session → identity maps, mirrored to disk and pruned on TTL.
//!
//! Persistence is coalesced: a burst of `persist()` calls while a write is
//! already in flight collapses to a single extra write instead of one per
//! caller, via a dirty flag checked by whichever caller is already holding
//! the write lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::kv_store::KvStore;

const DEFAULT_TTL_MS: u64 = 6 * 60 * 60 * 1000;
const DEFAULT_MAX_SIZE: usize = 200;
const DEFAULT_MISSING_GRACE_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeAffinity {
    #[serde(default)]
    pub seen_session_keys: HashMap<String, u64>,
    #[serde(default)]
    pub sticky_by_session_key: HashMap<String, String>,
    #[serde(default)]
    pub hybrid_by_session_key: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAffinityFile {
    pub version: u32,
    #[serde(flatten)]
    pub modes: HashMap<String, ModeAffinity>,
}

impl Default for SessionAffinityFile {
    fn default() -> Self {
        Self { version: 1, modes: HashMap::new() }
    }
}

pub struct SessionAffinityStore {
    kv: Arc<KvStore>,
    path: PathBuf,
    state: RwLock<SessionAffinityFile>,
    dirty: AtomicBool,
    write_lock: Mutex<()>,
    ttl_ms: u64,
    max_size: usize,
    missing_grace_ms: u64,
}

impl SessionAffinityStore {
    pub fn new(kv: Arc<KvStore>, path: PathBuf) -> Self {
        let state = kv.load(&path).unwrap_or_default();
        Self {
            kv,
            path,
            state: RwLock::new(state),
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            ttl_ms: DEFAULT_TTL_MS,
            max_size: DEFAULT_MAX_SIZE,
            missing_grace_ms: DEFAULT_MISSING_GRACE_MS,
        }
    }

    pub async fn sticky_for(&self, mode: &str, session_key: &str) -> Option<String> {
        self.state.read().await.modes.get(mode)?.sticky_by_session_key.get(session_key).cloned()
    }

    pub async fn hybrid_for(&self, mode: &str, session_key: &str) -> Option<String> {
        self.state.read().await.modes.get(mode)?.hybrid_by_session_key.get(session_key).cloned()
    }

    pub async fn record_sticky(&self, mode: &str, session_key: &str, identity_key: &str) {
        let mut state = self.state.write().await;
        let entry = state.modes.entry(mode.to_owned()).or_default();
        entry.sticky_by_session_key.insert(session_key.to_owned(), identity_key.to_owned());
        drop(state);
        self.persist().await;
    }

    pub async fn record_hybrid(&self, mode: &str, session_key: &str, identity_key: &str) {
        let mut state = self.state.write().await;
        let entry = state.modes.entry(mode.to_owned()).or_default();
        entry.hybrid_by_session_key.insert(session_key.to_owned(), identity_key.to_owned());
        drop(state);
        self.persist().await;
    }

    pub async fn clear_hybrid(&self, mode: &str, session_key: &str) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.modes.get_mut(mode) {
            entry.hybrid_by_session_key.remove(session_key);
        }
        drop(state);
        self.persist().await;
    }

    /// Record that `session_key` was observed at `now`, updating its
    /// last-seen timestamp. Subagent callers should not call this per spec
    /// (subagent requests never persist session mappings).
    pub async fn observe_session(&self, mode: &str, session_key: &str, now: u64) {
        {
            let mut state = self.state.write().await;
            let entry = state.modes.entry(mode.to_owned()).or_default();
            entry.seen_session_keys.insert(session_key.to_owned(), now);
        }
        self.prune(mode, now).await;
        self.persist().await;
    }

    /// Tell the store the host no longer recognizes `session_key`; pruned
    /// after `missing_grace_ms` has elapsed since it was last seen, rather
    /// than immediately (the host's existence check can be racy with the
    /// session's own recent activity).
    pub async fn mark_session_missing(&self, mode: &str, session_key: &str, now: u64) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.modes.get_mut(mode) {
            let stale = entry
                .seen_session_keys
                .get(session_key)
                .is_none_or(|seen| now.saturating_sub(*seen) >= self.missing_grace_ms);
            if stale {
                entry.seen_session_keys.remove(session_key);
                entry.sticky_by_session_key.remove(session_key);
                entry.hybrid_by_session_key.remove(session_key);
            }
        }
        drop(state);
        self.persist().await;
    }

    async fn prune(&self, mode: &str, now: u64) {
        let mut state = self.state.write().await;
        let Some(entry) = state.modes.get_mut(mode) else { return };

        entry.seen_session_keys.retain(|_, seen| now.saturating_sub(*seen) < self.ttl_ms);
        entry.sticky_by_session_key.retain(|key, _| entry.seen_session_keys.contains_key(key));
        entry.hybrid_by_session_key.retain(|key, _| entry.seen_session_keys.contains_key(key));

        if entry.seen_session_keys.len() > self.max_size {
            let mut by_age: Vec<(String, u64)> =
                entry.seen_session_keys.iter().map(|(k, v)| (k.clone(), *v)).collect();
            by_age.sort_by_key(|(_, seen)| *seen);
            let overflow = by_age.len() - self.max_size;
            for (key, _) in by_age.into_iter().take(overflow) {
                entry.seen_session_keys.remove(&key);
                entry.sticky_by_session_key.remove(&key);
                entry.hybrid_by_session_key.remove(&key);
            }
        }
    }

    /// Coalescing persist: if a write is already in flight, mark dirty and
    /// return — the in-flight writer will observe the flag and re-flush.
    async fn persist(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        let Ok(_guard) = self.write_lock.try_lock() else { return };

        loop {
            if !self.dirty.swap(false, Ordering::SeqCst) {
                return;
            }
            let snapshot = self.state.read().await.clone();
            if let Err(e) = self.kv.save::<SessionAffinityFile, _>(&self.path, |_| snapshot).await {
                tracing::warn!(err = %e, "failed to persist session affinity");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_affinity_tests.rs"]
mod tests;
