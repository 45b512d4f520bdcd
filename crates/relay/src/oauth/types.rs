// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the OAuth token endpoint.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Outcome of a completed refresh attempt (lease was held by us).
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Refreshed(crate::account::Account),
    LeaseHeldElsewhere,
}

/// Why a refresh attempt failed after we held the lease.
#[derive(Debug, Clone)]
pub enum RefreshError {
    /// Upstream rejected the refresh token itself (`invalid_grant`). Fatal —
    /// the orchestrator must surface this as a synthetic 401 and never retry.
    Revoked(String),
    /// Anything else: network error, malformed response, non-2xx that isn't
    /// `invalid_grant`. Recoverable via cooldown + failover to another account.
    Transient(String),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revoked(msg) => write!(f, "refresh token revoked: {msg}"),
            Self::Transient(msg) => write!(f, "refresh failed: {msg}"),
        }
    }
}

impl std::error::Error for RefreshError {}
