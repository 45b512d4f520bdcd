// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relay-core: transparent authenticating proxy that injects OAuth-derived
//! bearer credentials, rotates across a pool of accounts under rate-limit
//! pressure, and rewrites outbound requests for a spoofed client identity.

pub mod account;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod identity;
pub mod kv_store;
pub mod model_catalog;
pub mod oauth;
pub mod orchestrator;
pub mod quota;
pub mod rate_limit;
pub mod selector;
pub mod session_affinity;
pub mod transform;
pub mod transport;
pub mod url_guard;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::account::store::AccountStore;
use crate::config::RelayConfig;
use crate::kv_store::KvStore;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::quota::store::SnapshotStore;
use crate::session_affinity::SessionAffinityStore;
use crate::transport::real::{RealQuotaFetcher, RealTransport};
use crate::transport::{build_router, RelayState};

/// Run the relay server until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    std::fs::create_dir_all(&config.state_dir)?;

    let kv = Arc::new(KvStore::new());
    let accounts = AccountStore::new(Arc::clone(&kv), config.accounts_path(), config.provider.clone());
    accounts.ensure_domain().await?;
    let affinity = SessionAffinityStore::new(Arc::clone(&kv), config.affinity_path());
    let snapshots = SnapshotStore::new(kv, config.snapshots_path());

    let orchestrator_config = OrchestratorConfig {
        max_attempts: config.max_attempts,
        spoof_mode: config.resolved_spoof_mode(),
        program_name: config.program_name.clone(),
        plugin_version: config.plugin_version.clone(),
        platform: config.platform.clone(),
        arch: config.arch.clone(),
        terminal_descriptor: config.terminal_descriptor.clone(),
        base_instructions: config.base_instructions.clone(),
        prompt_cache_key_strategy: config.resolved_prompt_cache_key_strategy(),
        prompt_cache_key_version: config.prompt_cache_key_version,
        project: config.project.clone(),
        normalized_path: config.normalized_path.clone(),
        token_url: config.token_url.clone(),
        client_id: config.client_id.clone(),
        personality_key: config.personality_key.clone(),
    };

    let pid_offset = std::process::id() as usize;
    let orchestrator = Orchestrator::new(
        orchestrator_config,
        accounts,
        affinity,
        snapshots,
        Box::new(RealQuotaFetcher::new(config.quota_url.clone())),
        Box::new(RealTransport::new()),
        pid_offset,
    );

    let state = Arc::new(RelayState { config: config.clone(), orchestrator: Arc::new(orchestrator) });

    tracing::info!("relay listening on {addr}");
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
