use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::*;
use crate::account::Account;
use crate::kv_store::KvStore;
use crate::quota::coordinator::QuotaFetcher;
use crate::rate_limit::{Limit, QuotaSnapshot};

fn account(identity_key: &str) -> Account {
    Account {
        identity_key: identity_key.to_owned(),
        auth_mode: AuthMode::Native,
        account_id: Some("acct".to_owned()),
        email: Some("user@example.com".to_owned()),
        plan: Some("pro".to_owned()),
        access: format!("access-{identity_key}"),
        refresh: Some("refresh-token".to_owned()),
        expires: u64::MAX,
        enabled: true,
        cooldown_until: None,
        refresh_lease_until: None,
        last_used: None,
        auth_types: None,
    }
}

struct FakeQuotaFetcher;

#[async_trait]
impl QuotaFetcher for FakeQuotaFetcher {
    async fn fetch(&self, _access_token: &str, _account_id: Option<&str>) -> anyhow::Result<QuotaSnapshot> {
        Ok(QuotaSnapshot {
            updated_at: 0,
            model_family: "gpt".to_owned(),
            limits: vec![Limit { name: "5h".to_owned(), left_pct: 90, resets_at: None }],
            credits: None,
        })
    }
}

/// Returns a fixed status for every call, recording which account's bearer
/// token each request carried.
struct FixedStatusTransport {
    status: u16,
    seen_tokens: Mutex<Vec<String>>,
}

impl FixedStatusTransport {
    fn new(status: u16) -> Self {
        Self { status, seen_tokens: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Transport for FixedStatusTransport {
    async fn send(&self, request: TransportRequest) -> anyhow::Result<TransportResponse> {
        if let Some(auth) = request.headers.get("authorization") {
            self.seen_tokens.lock().await.push(auth.clone());
        }
        Ok(TransportResponse { status: self.status, headers: HashMap::new(), body: Some(serde_json::json!({})) })
    }
}

/// Returns 429 for the first account it sees, 200 for any other.
struct RotatingRateLimitTransport {
    first_token: Mutex<Option<String>>,
}

impl RotatingRateLimitTransport {
    fn new() -> Self {
        Self { first_token: Mutex::new(None) }
    }
}

#[async_trait]
impl Transport for RotatingRateLimitTransport {
    async fn send(&self, request: TransportRequest) -> anyhow::Result<TransportResponse> {
        let token = request.headers.get("authorization").cloned().unwrap_or_default();
        let mut first = self.first_token.lock().await;
        let recorded = first.get_or_insert_with(|| token.clone()).clone();
        drop(first);
        let is_first = recorded == token;

        if is_first {
            let mut headers = HashMap::new();
            headers.insert("retry-after".to_owned(), "1".to_owned());
            Ok(TransportResponse { status: 429, headers, body: None })
        } else {
            Ok(TransportResponse { status: 200, headers: HashMap::new(), body: Some(serde_json::json!({})) })
        }
    }
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_attempts: 3,
        spoof_mode: SpoofMode::Native,
        program_name: "relay".to_owned(),
        plugin_version: "0.1.0".to_owned(),
        platform: "linux".to_owned(),
        arch: "x86_64".to_owned(),
        terminal_descriptor: "xterm".to_owned(),
        base_instructions: "You are a helpful assistant.".to_owned(),
        prompt_cache_key_strategy: PromptCacheKeyStrategy::Passthrough,
        prompt_cache_key_version: 1,
        project: "proj".to_owned(),
        normalized_path: "/workspace".to_owned(),
        token_url: "https://auth.openai.com/token".to_owned(),
        client_id: "client-id".to_owned(),
        personality_key: None,
    }
}

async fn harness() -> (tempfile::TempDir, AccountStore, SessionAffinityStore, SnapshotStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let kv = Arc::new(KvStore::new());
    let accounts = AccountStore::new(Arc::clone(&kv), dir.path().join("auth.json"), "openai");
    let affinity = SessionAffinityStore::new(Arc::clone(&kv), dir.path().join("affinity.json"));
    let snapshots = SnapshotStore::new(kv, dir.path().join("snapshots.json"));
    (dir, accounts, affinity, snapshots)
}

fn request() -> FetchRequest {
    FetchRequest {
        url: "https://api.openai.com/v1/responses".to_owned(),
        headers: HashMap::new(),
        body: Some(serde_json::json!({"model": "gpt-5", "input": []})),
        mode: AuthMode::Native,
        strategy: Strategy::RoundRobin,
        is_subagent: false,
    }
}

#[tokio::test]
async fn returns_synthetic_error_when_no_accounts_configured() {
    let (_dir, accounts, affinity, snapshots) = harness().await;
    let orchestrator = Orchestrator::new(
        config(),
        accounts,
        affinity,
        snapshots,
        Box::new(FakeQuotaFetcher),
        Box::new(FixedStatusTransport::new(200)),
        0,
    );

    let response = orchestrator.execute(request(), &CancellationToken::new()).await;

    assert_eq!(response.status, 401);
    let body = response.body.expect("body");
    assert_eq!(body["error"]["type"], "no_accounts_configured");
}

#[tokio::test]
async fn dispatches_successfully_with_one_eligible_account() {
    let (_dir, accounts, affinity, snapshots) = harness().await;
    accounts.upsert_account(account("a1")).await.expect("upsert");

    let orchestrator = Orchestrator::new(
        config(),
        accounts,
        affinity,
        snapshots,
        Box::new(FakeQuotaFetcher),
        Box::new(FixedStatusTransport::new(200)),
        0,
    );

    let response = orchestrator.execute(request(), &CancellationToken::new()).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn rotates_to_next_account_after_429_and_succeeds() {
    let (_dir, accounts, affinity, snapshots) = harness().await;
    accounts.upsert_account(account("a1")).await.expect("upsert");
    accounts.upsert_account(account("a2")).await.expect("upsert");

    let orchestrator = Orchestrator::new(
        config(),
        accounts,
        affinity,
        snapshots,
        Box::new(FakeQuotaFetcher),
        Box::new(RotatingRateLimitTransport::new()),
        0,
    );

    let response = orchestrator.execute(request(), &CancellationToken::new()).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn exhausts_attempts_and_returns_synthetic_rate_limited() {
    let (_dir, accounts, affinity, snapshots) = harness().await;
    accounts.upsert_account(account("a1")).await.expect("upsert");

    let mut cfg = config();
    cfg.max_attempts = 2;
    let orchestrator = Orchestrator::new(
        cfg,
        accounts,
        affinity,
        snapshots,
        Box::new(FakeQuotaFetcher),
        Box::new(FixedStatusTransport::new(429)),
        0,
    );

    let response = orchestrator.execute(request(), &CancellationToken::new()).await;
    assert_eq!(response.status, 429);
    let body = response.body.expect("body");
    assert_eq!(body["error"]["type"], "all_accounts_rate_limited");
}

#[tokio::test]
async fn cancelled_request_returns_request_cancelled() {
    let (_dir, accounts, affinity, snapshots) = harness().await;
    accounts.upsert_account(account("a1")).await.expect("upsert");

    let orchestrator = Orchestrator::new(
        config(),
        accounts,
        affinity,
        snapshots,
        Box::new(FakeQuotaFetcher),
        Box::new(FixedStatusTransport::new(200)),
        0,
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let response = orchestrator.execute(request(), &cancel).await;
    assert_eq!(response.status, 499);
}
