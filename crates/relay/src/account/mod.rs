// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed view over persisted OAuth accounts (`auth.json`).

pub mod store;

use serde::{Deserialize, Serialize};

/// Which wire compatibility mode an account authenticates requests for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Native,
    Codex,
}

impl Default for AuthMode {
    fn default() -> Self {
        Self::Native
    }
}

/// Rotation strategy applied by the Selector for one provider's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    RoundRobin,
    Sticky,
    Hybrid,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::RoundRobin
    }
}

/// Distinguishes the fixed set of supported auth modes from arbitrary future
/// providers, so a persisted `auth_mode` string unrecognized by [`AuthMode`]
/// deserializes to a safe default instead of failing the whole account read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Known(AuthMode),
    Other(String),
}

impl ProviderConfig {
    pub fn as_auth_mode(&self) -> AuthMode {
        match self {
            Self::Known(mode) => *mode,
            Self::Other(_) => AuthMode::Native,
        }
    }
}

/// A single persisted account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub identity_key: String,
    #[serde(default, deserialize_with = "deserialize_auth_mode_lenient")]
    pub auth_mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    /// Absolute expiry, epoch ms.
    pub expires: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_lease_until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<u64>,
    /// Auth modes this account is eligible to serve. Absent is treated as
    /// `[native]` per spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_types: Option<Vec<AuthMode>>,
}

impl Account {
    pub fn auth_types(&self) -> Vec<AuthMode> {
        self.auth_types.clone().unwrap_or_else(|| vec![AuthMode::Native])
    }

    pub fn is_cooling_down(&self, now: u64) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    pub fn is_lease_held(&self, now: u64) -> bool {
        self.refresh_lease_until.is_some_and(|until| until > now)
    }

    pub fn is_eligible(&self, now: u64) -> bool {
        self.enabled && !self.is_cooling_down(now) && !self.is_lease_held(now)
    }
}

fn default_enabled() -> bool {
    true
}

/// Reads `authMode` leniently: an unrecognized string (a legacy or
/// future-provider value in hand-edited or pre-migration `auth.json`)
/// defaults to `native` via [`ProviderConfig::as_auth_mode`] instead of
/// failing the whole file's deserialization.
fn deserialize_auth_mode_lenient<'de, D>(deserializer: D) -> Result<AuthMode, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(ProviderConfig::deserialize(deserializer)?.as_auth_mode())
}

/// Per-mode subtree of a provider domain: the active identity and scoped
/// accounts list is derived on read, not stored redundantly here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_identity_key: Option<String>,
}

/// One provider's account domain: `{type, strategy, accounts, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDomain {
    #[serde(rename = "type", default = "default_domain_type")]
    pub domain_type: String,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_identity_key: Option<String>,
    #[serde(default)]
    pub native: ModeState,
    #[serde(default)]
    pub codex: ModeState,
}

impl Default for ProviderDomain {
    fn default() -> Self {
        Self {
            domain_type: default_domain_type(),
            strategy: Strategy::default(),
            accounts: Vec::new(),
            active_identity_key: None,
            native: ModeState::default(),
            codex: ModeState::default(),
        }
    }
}

fn default_domain_type() -> String {
    "oauth".to_owned()
}

/// Top-level `auth.json` contents: provider name → domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthFile {
    #[serde(flatten)]
    pub providers: std::collections::HashMap<String, ProviderDomain>,
}
