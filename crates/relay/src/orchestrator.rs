// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fetch orchestrator: the retry loop that acquires an account, attaches
//! credentials, dispatches one attempt, classifies the response, imposes
//! cooldowns on rate-limit signals, and retries on another account up to a
//! bounded attempt count. Never throws to the caller — every exit path
//! returns a `TransportResponse`, synthetic or real.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::account::store::AccountStore;
use crate::account::{Account, AuthMode, Strategy};
use crate::clock::Clock;
use crate::collaborators::{
    ModelCatalogFetcher, NullPersonalityResolver, NullToastSink, PersonalityResolver, ToastSink,
    ToastVariant, Transport, TransportRequest, TransportResponse,
};
use crate::error::ErrorCode;
use crate::model_catalog::CatalogModel;
use crate::oauth::refresher::OAuthRefresher;
use crate::oauth::types::{RefreshError, RefreshOutcome};
use crate::quota::coordinator::{QuotaFetcher, QuotaRefreshCoordinator};
use crate::quota::store::SnapshotStore;
use crate::rate_limit;
use crate::selector::{NoEligibleReason, Selector, SelectionOutcome};
use crate::session_affinity::SessionAffinityStore;
use crate::transform::{self, OutboundRequest, PromptCacheKeyStrategy, SpoofMode, TransformContext};
use crate::url_guard::{self, GuardError};

const SESSION_EVENT_DEBOUNCE_MS: u64 = 15_000;
const ACCOUNT_SWITCH_DEBOUNCE_MS: u64 = 30_000;
const RATE_LIMIT_SWITCH_DEBOUNCE_MS: u64 = 60_000;
const SESSION_RESUME_DEBOUNCE_MS: u64 = 15_000;
const DEDUPE_MAX_SIZE: usize = 512;

const FALLBACK_BACKOFF_MS: u64 = 5_000;

/// Static client-identity fields baked in once at startup; never mutated.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_attempts: u32,
    pub spoof_mode: SpoofMode,
    pub program_name: String,
    pub plugin_version: String,
    pub platform: String,
    pub arch: String,
    pub terminal_descriptor: String,
    pub base_instructions: String,
    pub prompt_cache_key_strategy: PromptCacheKeyStrategy,
    pub prompt_cache_key_version: u32,
    pub project: String,
    pub normalized_path: String,
    pub token_url: String,
    pub client_id: String,
    pub personality_key: Option<String>,
}

/// One caller-supplied outbound call, already carrying the attributes the
/// selector needs to pick an account for it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub mode: AuthMode,
    pub strategy: Strategy,
    pub is_subagent: bool,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    clock: Clock,
    accounts: AccountStore,
    selector: Selector,
    refresher: OAuthRefresher,
    affinity: SessionAffinityStore,
    snapshots: SnapshotStore,
    quota_coordinator: QuotaRefreshCoordinator,
    quota_fetcher: Box<dyn QuotaFetcher>,
    transport: Box<dyn Transport>,
    catalog_fetcher: Option<Box<dyn ModelCatalogFetcher>>,
    catalog: Mutex<Vec<CatalogModel>>,
    personality: Box<dyn PersonalityResolver>,
    toast: Box<dyn ToastSink>,
    toast_dedupe: Mutex<HashMap<String, u64>>,
    pid_offset: usize,
}

#[allow(clippy::too_many_arguments)]
impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        accounts: AccountStore,
        affinity: SessionAffinityStore,
        snapshots: SnapshotStore,
        quota_fetcher: Box<dyn QuotaFetcher>,
        transport: Box<dyn Transport>,
        pid_offset: usize,
    ) -> Self {
        Self {
            config,
            clock: Clock,
            accounts,
            selector: Selector::new(),
            refresher: OAuthRefresher::new(),
            affinity,
            snapshots,
            quota_coordinator: QuotaRefreshCoordinator::new(),
            quota_fetcher,
            transport,
            catalog_fetcher: None,
            catalog: Mutex::new(Vec::new()),
            personality: Box::new(NullPersonalityResolver),
            toast: Box::new(NullToastSink),
            toast_dedupe: Mutex::new(HashMap::new()),
            pid_offset,
        }
    }

    pub fn with_catalog_fetcher(mut self, fetcher: Box<dyn ModelCatalogFetcher>) -> Self {
        self.catalog_fetcher = Some(fetcher);
        self
    }

    pub fn with_personality_resolver(mut self, resolver: Box<dyn PersonalityResolver>) -> Self {
        self.personality = resolver;
        self
    }

    pub fn with_toast_sink(mut self, sink: Box<dyn ToastSink>) -> Self {
        self.toast = sink;
        self
    }

    /// Seed the in-memory model catalog snapshot (e.g. loaded once at
    /// startup). The orchestrator never fetches the catalog itself.
    pub async fn set_catalog(&self, catalog: Vec<CatalogModel>) {
        *self.catalog.lock().await = catalog;
    }

    /// Non-secret account status snapshot for the operator-facing status
    /// route. Both auth modes are merged and deduplicated by identity key.
    pub fn list_accounts(&self) -> Vec<Account> {
        let mut seen = std::collections::HashSet::new();
        self.accounts
            .list(AuthMode::Native)
            .into_iter()
            .chain(self.accounts.list(AuthMode::Codex))
            .filter(|a| seen.insert(a.identity_key.clone()))
            .collect()
    }

    /// Force a cooldown on one account; the operator/testing escape hatch
    /// backing `POST /api/v1/accounts/{identity}/cooldown`.
    pub async fn force_cooldown(&self, identity_key: &str, until_ms: u64) -> anyhow::Result<()> {
        self.accounts.set_cooldown(identity_key, until_ms).await
    }

    pub async fn execute(&self, request: FetchRequest, cancel: &CancellationToken) -> TransportResponse {
        let session_key = rate_limit::header_lookup(&request.headers, "session_id").map(str::to_owned);
        let mode_key = crate::selector::mode_key(request.mode);
        let now = self.clock.now_ms();

        if let (Some(key), false) = (session_key.as_deref(), request.is_subagent) {
            self.affinity.observe_session(&mode_key, key, now).await;
        }

        let mut previous_status: Option<u16> = None;
        let mut previous_identity_key: Option<String> = None;
        let mut last_retry_after_ms: Option<u64> = None;
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return synthetic(ErrorCode::RequestCancelled, "request cancelled");
            }

            let now = self.clock.now_ms();
            let accounts = self.accounts.list(request.mode);
            let outcome = self
                .selector
                .select(
                    &accounts,
                    request.mode,
                    request.strategy,
                    session_key.as_deref(),
                    request.is_subagent,
                    now,
                    self.pid_offset,
                    &self.affinity,
                )
                .await;

            let account = match outcome {
                SelectionOutcome::NoEligible { reason, .. } => {
                    return match reason {
                        NoEligibleReason::EmptyPool | NoEligibleReason::AllDisabled => {
                            synthetic(ErrorCode::NoAccountsConfigured, "no accounts configured; run login")
                        }
                        NoEligibleReason::AllCoolingDown | NoEligibleReason::AllRefreshLocked => synthetic(
                            ErrorCode::AllAccountsCoolingDown,
                            "all accounts are cooling down, try again shortly",
                        ),
                    };
                }
                SelectionOutcome::Selected { account, .. } => account,
            };

            let account = if account.expires <= now {
                match self
                    .refresher
                    .refresh(&self.accounts, &account.identity_key, &self.config.token_url, &self.config.client_id, now)
                    .await
                {
                    Ok(RefreshOutcome::Refreshed(refreshed)) => refreshed,
                    Ok(RefreshOutcome::LeaseHeldElsewhere) => {
                        // Another caller holds the refresh lease; this account's
                        // token may already be expired in-flight. Treat it as
                        // temporarily ineligible for this attempt and reselect.
                        tracing::debug!(
                            identity = %account.identity_key,
                            "refresh lease held elsewhere, skipping account this attempt"
                        );
                        continue;
                    }
                    Err(RefreshError::Revoked(msg)) => {
                        return synthetic(ErrorCode::RefreshInvalidGrant, &msg);
                    }
                    Err(RefreshError::Transient(msg)) => {
                        tracing::warn!(identity = %account.identity_key, err = %msg, "transient refresh failure");
                        continue;
                    }
                }
            } else {
                account
            };

            let reason_code = if attempt == 0 {
                "initial_attempt"
            } else if previous_status == Some(429)
                && previous_identity_key.as_deref() != Some(account.identity_key.as_str())
            {
                "retry_switched_account_after_429"
            } else {
                "retry_same_account_after_429"
            };

            if reason_code == "retry_switched_account_after_429" {
                self.maybe_emit(
                    "account:switch",
                    ACCOUNT_SWITCH_DEBOUNCE_MS,
                    now,
                    "switched to another account after a rate limit",
                    ToastVariant::Info,
                )
                .await;
            }
            if session_key.is_some() {
                self.maybe_emit(
                    &format!("session:{reason_code}"),
                    SESSION_EVENT_DEBOUNCE_MS,
                    now,
                    reason_code,
                    ToastVariant::Info,
                )
                .await;
            }

            let outbound = OutboundRequest {
                url: request.url.clone(),
                headers: request.headers.clone(),
                body: request.body.clone(),
            };

            let guarded = match url_guard::enforce(&outbound.url) {
                Ok(url) => url,
                Err(GuardError::DisallowedHost(host)) => {
                    return synthetic(ErrorCode::DisallowedOutboundHost, &format!("host not allowed: {host}"));
                }
                Err(GuardError::DisallowedProtocol(scheme)) => {
                    return synthetic(
                        ErrorCode::DisallowedOutboundProtocol,
                        &format!("protocol not allowed: {scheme}"),
                    );
                }
            };

            let mut outbound = outbound;
            outbound.url = guarded.to_string();
            let model_family = outbound
                .body
                .as_ref()
                .and_then(|b| b.get("model"))
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_owned();
            let mut outbound = self.transform_outbound(outbound).await;

            outbound.headers.insert("authorization".to_owned(), format!("Bearer {}", account.access));
            if let Some(account_id) = account.account_id.as_ref() {
                outbound.headers.insert("chatgpt-account-id".to_owned(), account_id.clone());
            }
            if let Some(ref key) = session_key {
                outbound.headers.insert("session_id".to_owned(), key.clone());
            }

            let transport_request = TransportRequest {
                method: "POST".to_owned(),
                url: outbound.url.clone(),
                headers: outbound.headers.clone(),
                body: outbound.body.clone(),
            };

            if let Err(e) = self.accounts.mark_used(&account.identity_key, now).await {
                tracing::warn!(err = %e, "failed to record last_used");
            }

            let response = match self.transport.send(transport_request).await {
                Ok(resp) => resp,
                Err(e) => {
                    return synthetic(ErrorCode::PluginFetchFailed, &format!("transport error: {e:#}"));
                }
            };

            if response.status != 429 {
                let snapshot = rate_limit::snapshot_from_headers(now, &model_family, &response.headers);
                if let Err(e) = self.snapshots.put(&account.identity_key, snapshot).await {
                    tracing::warn!(err = %e, "failed to persist rate-limit snapshot");
                }
                self.maybe_refresh_quota(&account.identity_key, now).await;
                return response;
            }

            let retry_after_ms = rate_limit::parse_retry_after_ms(&response.headers, now);
            let cooldown_ms = retry_after_ms.unwrap_or(FALLBACK_BACKOFF_MS);
            last_retry_after_ms = retry_after_ms;

            if let Err(e) = self.accounts.set_cooldown(&account.identity_key, now + cooldown_ms).await {
                tracing::warn!(err = %e, "failed to set cooldown");
            }
            previous_status = Some(429);
            previous_identity_key = Some(account.identity_key.clone());

            self.maybe_emit(
                &format!("rate-limit-switch:{}", account.identity_key),
                RATE_LIMIT_SWITCH_DEBOUNCE_MS,
                now,
                "rate limited, rotating to another account",
                ToastVariant::Warning,
            )
            .await;
        }

        let wait_label = last_retry_after_ms.map(format_wait).unwrap_or_else(|| "a short while".to_owned());
        synthetic(ErrorCode::AllAccountsRateLimited, &format!("Try again in {wait_label}"))
    }

    /// Tell the orchestrator the host no longer recognizes `session_key`
    /// (e.g. the session's window was closed); debounced under
    /// `session:resume` is not applicable here, this just forwards the
    /// affinity-store prune per spec.md §4.10.
    pub async fn mark_session_missing(&self, mode: AuthMode, session_key: &str, now: u64) {
        self.affinity.mark_session_missing(&crate::selector::mode_key(mode), session_key, now).await;
    }

    /// Signal that a previously-missing session resumed; debounced under the
    /// dedicated `session:resume` key.
    pub async fn notify_session_resumed(&self, session_key: &str, now: u64) {
        self.maybe_emit(
            &format!("session:resume:{session_key}"),
            SESSION_RESUME_DEBOUNCE_MS,
            now,
            "session resumed",
            ToastVariant::Info,
        )
        .await;
    }

    async fn transform_outbound(&self, outbound: OutboundRequest) -> OutboundRequest {
        let model_slug =
            outbound.body.as_ref().and_then(|b| b.get("model")).and_then(Value::as_str).unwrap_or("").to_owned();

        let catalog = self.catalog.lock().await;
        let catalog_model = crate::model_catalog::find_model(&catalog, &model_slug).cloned();
        drop(catalog);

        let instructions_template = catalog_model.as_ref().and_then(|m| m.instructions_template.clone());
        let personality_text = match self.config.personality_key.as_deref() {
            Some(key) => self.personality.resolve(key),
            None => None,
        };

        let ctx = TransformContext {
            mode: self.config.spoof_mode,
            program_name: &self.config.program_name,
            plugin_version: &self.config.plugin_version,
            platform: &self.config.platform,
            arch: &self.config.arch,
            terminal_descriptor: &self.config.terminal_descriptor,
            base_instructions: &self.config.base_instructions,
            instructions_template: instructions_template.as_deref(),
            personality_text: personality_text.as_deref(),
            prompt_cache_key_strategy: self.config.prompt_cache_key_strategy,
            prompt_cache_key_version: self.config.prompt_cache_key_version,
            project: &self.config.project,
            normalized_path: &self.config.normalized_path,
        };

        let (outbound, reports) = transform::apply(outbound, &ctx);
        for report in &reports {
            tracing::debug!(phase = report.phase, changed = report.changed, reason = %report.reason, "transform phase");
        }
        outbound
    }

    async fn maybe_refresh_quota(&self, identity_key: &str, now: u64) {
        if !self.quota_coordinator.is_stale(identity_key, now).await {
            return;
        }
        let result = self
            .quota_coordinator
            .maybe_refresh(
                self.quota_fetcher.as_ref(),
                &self.accounts,
                &self.refresher,
                &self.snapshots,
                identity_key,
                &self.config.token_url,
                &self.config.client_id,
                now,
            )
            .await;

        match result {
            Ok(Some(crossings)) if !crossings.is_empty() => {
                let cooldown_at = crate::quota::tracker::cooldown_for_exhaustion(&crossings, now);
                let has_exhausted =
                    crossings.iter().any(|c| c.kind == crate::quota::tracker::CrossingKind::Exhausted);
                if has_exhausted {
                    if let Err(e) = self.accounts.set_cooldown(identity_key, cooldown_at).await {
                        tracing::warn!(err = %e, "failed to set cooldown after quota exhaustion");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(identity = %identity_key, err = %e, "quota refresh failed"),
        }
    }

    /// Debounced toast emission: at most one call per `key` within `window_ms`.
    /// The dedupe map is bounded; oldest entries are evicted first.
    async fn maybe_emit(&self, key: &str, window_ms: u64, now: u64, message: &str, variant: ToastVariant) {
        let mut dedupe = self.toast_dedupe.lock().await;
        if dedupe.get(key).is_some_and(|&last| now.saturating_sub(last) < window_ms) {
            return;
        }
        dedupe.insert(key.to_owned(), now);

        if dedupe.len() > DEDUPE_MAX_SIZE {
            if let Some(oldest_key) = dedupe.iter().min_by_key(|(_, &ts)| ts).map(|(k, _)| k.clone()) {
                dedupe.remove(&oldest_key);
            }
        }
        drop(dedupe);

        self.toast.show(message, variant, false);
    }
}

fn synthetic(code: ErrorCode, message: &str) -> TransportResponse {
    let body = code.to_error_body(message);
    let mut headers = HashMap::new();
    headers.insert("content-type".to_owned(), "application/json".to_owned());
    TransportResponse {
        status: code.http_status(),
        headers,
        body: Some(serde_json::json!({ "error": body })),
    }
}

fn format_wait(ms: u64) -> String {
    let total_secs = ms / 1000;
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
