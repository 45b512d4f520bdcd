// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive owner of `auth.json` mutation. Every write goes through
//! [`AccountStore::save`], which serializes concurrent callers per file via
//! [`crate::kv_store::KvStore`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::account::{Account, AuthFile, AuthMode, ProviderDomain};
use crate::kv_store::KvStore;

pub struct AccountStore {
    kv: Arc<KvStore>,
    path: PathBuf,
    provider: String,
}

impl AccountStore {
    pub fn new(kv: Arc<KvStore>, path: PathBuf, provider: impl Into<String>) -> Self {
        Self { kv, path, provider: provider.into() }
    }

    fn read(&self) -> AuthFile {
        self.kv.load(&self.path).unwrap_or_default()
    }

    /// All accounts in this provider's domain whose `authTypes` (or the
    /// `[native]` default) contains `mode`.
    pub fn list(&self, mode: AuthMode) -> Vec<Account> {
        let file = self.read();
        let Some(domain) = file.providers.get(&self.provider) else { return Vec::new() };
        domain.accounts.iter().filter(|acct| acct.auth_types().contains(&mode)).cloned().collect()
    }

    /// Ensure a domain exists for this provider, creating an empty one with
    /// the default strategy if absent. Idempotent.
    pub async fn ensure_domain(&self) -> anyhow::Result<()> {
        let provider = self.provider.clone();
        self.kv
            .save::<AuthFile, _>(&self.path, move |current| {
                let mut file = current.unwrap_or_default();
                file.providers.entry(provider).or_insert_with(ProviderDomain::default);
                file
            })
            .await?;
        Ok(())
    }

    /// Apply `patch` to the account matching `identity_key`, inside a single
    /// atomic save. No-op if the account is absent.
    pub async fn update_account<F>(&self, identity_key: &str, patch: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Account) + Send + 'static,
    {
        let provider = self.provider.clone();
        let identity_key = identity_key.to_owned();
        self.kv
            .save::<AuthFile, _>(&self.path, move |current| {
                let mut file = current.unwrap_or_default();
                if let Some(domain) = file.providers.get_mut(&provider) {
                    if let Some(acct) =
                        domain.accounts.iter_mut().find(|a| a.identity_key == identity_key)
                    {
                        patch(acct);
                    }
                }
                file
            })
            .await?;
        Ok(())
    }

    /// Insert or replace an account wholesale (used by OAuth authorize
    /// callback / legacy import).
    pub async fn upsert_account(&self, account: Account) -> anyhow::Result<()> {
        let provider = self.provider.clone();
        self.kv
            .save::<AuthFile, _>(&self.path, move |current| {
                let mut file = current.unwrap_or_default();
                let domain = file.providers.entry(provider).or_insert_with(ProviderDomain::default);
                match domain.accounts.iter_mut().find(|a| a.identity_key == account.identity_key) {
                    Some(existing) => *existing = account,
                    None => domain.accounts.push(account),
                }
                file
            })
            .await?;
        Ok(())
    }

    pub async fn set_cooldown(&self, identity_key: &str, until: u64) -> anyhow::Result<()> {
        self.update_account(identity_key, move |acct| acct.cooldown_until = Some(until)).await
    }

    /// Record that an account was just dispatched to, for the selector's
    /// oldest-`last_used` round-robin tie-break.
    pub async fn mark_used(&self, identity_key: &str, now: u64) -> anyhow::Result<()> {
        self.update_account(identity_key, move |acct| acct.last_used = Some(now)).await
    }

    /// Atomically set `refresh_lease_until = now + lease_ms` iff no future
    /// lease already exists, returning the account snapshot on success.
    /// `None` means another caller already holds the lease.
    pub async fn try_acquire_lease(
        &self,
        identity_key: &str,
        now: u64,
        lease_ms: u64,
    ) -> anyhow::Result<Option<Account>> {
        let provider = self.provider.clone();
        let identity_key = identity_key.to_owned();
        let closure_identity_key = identity_key.clone();
        let acquired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let acquired_flag = Arc::clone(&acquired);

        let file = self
            .kv
            .save::<AuthFile, _>(&self.path, move |current| {
                let mut file = current.unwrap_or_default();
                if let Some(domain) = file.providers.get_mut(&provider) {
                    if let Some(acct) =
                        domain.accounts.iter_mut().find(|a| a.identity_key == closure_identity_key)
                    {
                        if !acct.is_lease_held(now) {
                            acct.refresh_lease_until = Some(now + lease_ms);
                            acquired_flag.store(true, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                }
                file
            })
            .await?;

        if !acquired.load(std::sync::atomic::Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(file
            .providers
            .get(&self.provider)
            .and_then(|d| d.accounts.iter().find(|a| a.identity_key == identity_key).cloned()))
    }

    pub async fn delete_account(&self, identity_key: &str) -> anyhow::Result<()> {
        let provider = self.provider.clone();
        let identity_key = identity_key.to_owned();
        self.kv
            .save::<AuthFile, _>(&self.path, move |current| {
                let mut file = current.unwrap_or_default();
                if let Some(domain) = file.providers.get_mut(&provider) {
                    domain.accounts.retain(|a| a.identity_key != identity_key);
                }
                file
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
