// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local HTTP front door: the one caller-facing surface a host coding-agent
//! runtime points its HTTP client at, plus operator-facing status/cooldown
//! routes.

pub mod auth;
pub mod http;
pub mod real;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::orchestrator::Orchestrator;

/// Shared state handed to every route handler.
pub struct RelayState {
    pub config: RelayConfig,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/v1/relay", post(http::relay))
        .route("/api/v1/accounts", get(http::list_accounts))
        .route("/api/v1/accounts/{identity}/cooldown", post(http::set_cooldown))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
