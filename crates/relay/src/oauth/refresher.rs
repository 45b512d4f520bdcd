// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease-guarded, single-flight-per-account OAuth refresh.
//!
//! Only the caller that wins the lease (`AccountStore::try_acquire_lease`)
//! talks to the token endpoint; everyone else observes `refreshLeaseUntil`
//! in the future and treats the account as temporarily ineligible.

use std::time::Duration;

use crate::account::store::AccountStore;
use crate::identity::{identity_key, parse_jwt_claims_lenient};
use crate::oauth::types::{RefreshError, RefreshOutcome, TokenErrorResponse, TokenResponse};

const DEFAULT_LEASE_MS: u64 = 30_000;
const DEFAULT_FAILURE_COOLDOWN_MS: u64 = 30_000;
const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OAuthRefresher {
    http: reqwest::Client,
    lease_ms: u64,
    failure_cooldown_ms: u64,
}

impl Default for OAuthRefresher {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthRefresher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            lease_ms: DEFAULT_LEASE_MS,
            failure_cooldown_ms: DEFAULT_FAILURE_COOLDOWN_MS,
        }
    }

    #[cfg(test)]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http, lease_ms: DEFAULT_LEASE_MS, failure_cooldown_ms: DEFAULT_FAILURE_COOLDOWN_MS }
    }

    /// Attempt to refresh `identity_key`'s access token. Returns
    /// `LeaseHeldElsewhere` without contacting the token endpoint if another
    /// caller already holds the lease.
    pub async fn refresh(
        &self,
        store: &AccountStore,
        identity_key_value: &str,
        token_url: &str,
        client_id: &str,
        now: u64,
    ) -> Result<RefreshOutcome, RefreshError> {
        let account = store
            .try_acquire_lease(identity_key_value, now, self.lease_ms)
            .await
            .map_err(|e| RefreshError::Transient(format!("lease store error: {e}")))?;
        let Some(account) = account else {
            return Ok(RefreshOutcome::LeaseHeldElsewhere);
        };

        let Some(refresh_token) = account.refresh.clone() else {
            self.release_on_failure(store, identity_key_value, now).await;
            return Err(RefreshError::Transient("no refresh token available".to_owned()));
        };

        match self.do_refresh(client_id, &refresh_token, token_url).await {
            Ok(token) => {
                let identity = parse_jwt_claims_lenient(&token.access_token);
                let account_id = identity.as_ref().and_then(|c| c.account_id.clone());
                let email = identity.as_ref().and_then(|c| c.email.clone());
                let plan = identity.as_ref().and_then(|c| c.plan.clone());
                let new_key = identity_key(account_id.as_deref(), email.as_deref(), plan.as_deref());

                let access_token = token.access_token.clone();
                let refresh_token = token.refresh_token.clone();
                let expires = token.expires_in.map(|secs| now + secs * 1_000).unwrap_or(account.expires);
                let previous_identity_key = identity_key_value.to_owned();

                store
                    .update_account(&previous_identity_key, move |acct| {
                        acct.access = access_token;
                        if let Some(refresh) = refresh_token {
                            acct.refresh = Some(refresh);
                        }
                        acct.expires = expires;
                        acct.refresh_lease_until = None;
                        acct.cooldown_until = None;
                        if let Some(id) = account_id {
                            acct.account_id = Some(id);
                        }
                        if let Some(e) = email {
                            acct.email = Some(e);
                        }
                        if let Some(p) = plan {
                            acct.plan = Some(p);
                        }
                        acct.identity_key = new_key;
                    })
                    .await
                    .map_err(|e| RefreshError::Transient(format!("persist refresh: {e}")))?;

                let refreshed = store
                    .list(account.auth_mode)
                    .into_iter()
                    .find(|a| a.access == token.access_token)
                    .unwrap_or(account);
                Ok(RefreshOutcome::Refreshed(refreshed))
            }
            Err(err) => {
                self.release_on_failure(store, identity_key_value, now).await;
                Err(err)
            }
        }
    }

    async fn release_on_failure(&self, store: &AccountStore, identity_key: &str, now: u64) {
        let until = now + self.failure_cooldown_ms;
        let result = store
            .update_account(identity_key, move |acct| {
                acct.refresh_lease_until = None;
                acct.cooldown_until = Some(until);
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(err = %e, "failed to release lease after refresh failure");
        }
    }

    async fn do_refresh(
        &self,
        client_id: &str,
        refresh_token: &str,
        token_url: &str,
    ) -> Result<TokenResponse, RefreshError> {
        let form_body = format!(
            "grant_type=refresh_token&client_id={}&refresh_token={}",
            urlencoded(client_id),
            urlencoded(refresh_token),
        );

        let resp = self
            .http
            .post(token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form_body)
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .map_err(|e| RefreshError::Transient(format!("HTTP error: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| RefreshError::Transient(format!("read body: {e}")))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(&body) {
                if err.error == "invalid_grant" {
                    return Err(RefreshError::Revoked(err.error_description.unwrap_or(err.error)));
                }
                return Err(RefreshError::Transient(format!(
                    "{}: {}",
                    err.error,
                    err.error_description.unwrap_or_default()
                )));
            }
            return Err(RefreshError::Transient(format!("HTTP {status}: {body}")));
        }

        serde_json::from_str(&body).map_err(|e| RefreshError::Transient(format!("parse response: {e}")))
    }
}

fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => {
                out.push('%');
                out.push_str(&format!("{b:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "refresher_tests.rs"]
mod tests;
