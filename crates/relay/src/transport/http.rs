// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the relay proxy.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::account::{AuthMode, Strategy};
use crate::error::ErrorCode;
use crate::orchestrator::FetchRequest;
use crate::transport::RelayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// `GET /api/v1/health`.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned() })
}

#[derive(Debug, Deserialize)]
pub struct RelayRequestBody {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub mode: AuthModeWire,
    /// Omitted entirely means "use the server's configured default",
    /// distinct from explicitly requesting `round_robin`.
    #[serde(default)]
    pub strategy: Option<StrategyWire>,
    #[serde(default)]
    pub is_subagent: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthModeWire {
    #[default]
    Native,
    Codex,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyWire {
    #[default]
    RoundRobin,
    Sticky,
    Hybrid,
}

#[derive(Debug, Serialize)]
pub struct RelayResponseBody {
    pub status: u16,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// `POST /v1/relay` — the one caller-facing endpoint: runs an already-built
/// outbound request descriptor through the full pipeline and returns the
/// resulting response descriptor, synthetic or real.
pub async fn relay(
    State(state): State<Arc<RelayState>>,
    Json(req): Json<RelayRequestBody>,
) -> impl IntoResponse {
    let mode = match req.mode {
        AuthModeWire::Native => AuthMode::Native,
        AuthModeWire::Codex => AuthMode::Codex,
    };
    let strategy = match req.strategy {
        Some(StrategyWire::RoundRobin) => Strategy::RoundRobin,
        Some(StrategyWire::Sticky) => Strategy::Sticky,
        Some(StrategyWire::Hybrid) => Strategy::Hybrid,
        None => state.config.resolved_strategy(),
    };

    let fetch_request = FetchRequest {
        url: req.url,
        headers: req.headers,
        body: req.body,
        mode,
        strategy,
        is_subagent: req.is_subagent,
    };

    let response = state.orchestrator.execute(fetch_request, &CancellationToken::new()).await;
    Json(RelayResponseBody { status: response.status, headers: response.headers, body: response.body })
}

#[derive(Debug, Serialize)]
pub struct AccountStatus {
    pub identity_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<u64>,
}

/// `GET /api/v1/accounts` — non-secret account status snapshot.
pub async fn list_accounts(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    let accounts = state
        .orchestrator
        .list_accounts()
        .into_iter()
        .map(|a| AccountStatus {
            identity_key: a.identity_key,
            account_id: a.account_id,
            email: a.email,
            plan: a.plan,
            enabled: a.enabled,
            cooldown_until: a.cooldown_until,
        })
        .collect::<Vec<_>>();
    Json(accounts)
}

#[derive(Debug, Deserialize)]
pub struct CooldownRequest {
    pub until_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct CooldownResponse {
    pub identity_key: String,
    pub cooldown_until: u64,
}

/// `POST /api/v1/accounts/{identity}/cooldown` — operator/testing escape
/// hatch to force a cooldown on one account.
pub async fn set_cooldown(
    State(state): State<Arc<RelayState>>,
    Path(identity): Path<String>,
    Json(req): Json<CooldownRequest>,
) -> impl IntoResponse {
    match state.orchestrator.force_cooldown(&identity, req.until_ms).await {
        Ok(()) => {
            Json(CooldownResponse { identity_key: identity, cooldown_until: req.until_ms }).into_response()
        }
        Err(e) => {
            tracing::warn!(identity = %identity, err = %e, "failed to force cooldown");
            ErrorCode::Internal.to_http_response(format!("failed to set cooldown: {e}")).into_response()
        }
    }
}
