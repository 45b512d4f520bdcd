// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use crate::account::Strategy;
use crate::transform::{PromptCacheKeyStrategy, SpoofMode};

/// Configuration for the relay proxy.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "relay", about = "Authenticating proxy with account rotation and rate-limit awareness")]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "RELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9900, env = "RELAY_PORT")]
    pub port: u16,

    /// Bearer token for the local relay API. If unset, auth is disabled.
    #[arg(long, env = "RELAY_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Directory holding `auth.json`, `snapshots.json`, `affinity.json`.
    #[arg(long, default_value = "./relay-state", env = "RELAY_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Provider name scoping the account domain within `auth.json`.
    #[arg(long, default_value = "openai", env = "RELAY_PROVIDER")]
    pub provider: String,

    /// Account rotation strategy: `round_robin`, `sticky`, or `hybrid`.
    #[arg(long, default_value = "round_robin", env = "RELAY_STRATEGY")]
    pub strategy: String,

    /// Max attempts (account rotations) per inbound request before
    /// returning a synthetic rate-limited response.
    #[arg(long, default_value_t = 4, env = "RELAY_MAX_ATTEMPTS")]
    pub max_attempts: u32,

    /// Prompt-cache-key override strategy: `project` or `passthrough`.
    #[arg(long, default_value = "project", env = "RELAY_PROMPT_CACHE_KEY_STRATEGY")]
    pub prompt_cache_key_strategy: String,

    /// Prompt-cache-key version embedded in derived keys.
    #[arg(long, default_value_t = 1, env = "RELAY_PROMPT_CACHE_KEY_VERSION")]
    pub prompt_cache_key_version: u32,

    /// Whether outbound requests spoof a CLI-style client identity
    /// (`spoof`) or preserve the inbound one verbatim (`native`).
    #[arg(long, default_value = "spoof", env = "RELAY_SPOOF_MODE")]
    pub spoof_mode: String,

    /// Spoofed program name used in `originator`/`user-agent`.
    #[arg(long, default_value = "codex-relay", env = "RELAY_PROGRAM_NAME")]
    pub program_name: String,

    /// Spoofed plugin/client version.
    #[arg(long, default_value = env!("CARGO_PKG_VERSION"), env = "RELAY_PLUGIN_VERSION")]
    pub plugin_version: String,

    /// Spoofed platform token (`user-agent` composition).
    #[arg(long, default_value = std::env::consts::OS, env = "RELAY_PLATFORM")]
    pub platform: String,

    /// Spoofed architecture token (`user-agent` composition).
    #[arg(long, default_value = std::env::consts::ARCH, env = "RELAY_ARCH")]
    pub arch: String,

    /// Terminal descriptor appended to the spoofed `user-agent`.
    #[arg(long, default_value = "unknown", env = "RELAY_TERMINAL_DESCRIPTOR")]
    pub terminal_descriptor: String,

    /// Fallback instructions text used when no catalog template resolves.
    #[arg(long, default_value = "You are a helpful coding assistant.", env = "RELAY_BASE_INSTRUCTIONS")]
    pub base_instructions: String,

    /// Project name folded into the derived `project` prompt-cache key.
    #[arg(long, default_value = "default", env = "RELAY_PROJECT")]
    pub project: String,

    /// Normalized workspace path folded into the derived prompt-cache key.
    #[arg(long, default_value = ".", env = "RELAY_NORMALIZED_PATH")]
    pub normalized_path: String,

    /// OAuth token endpoint used by the refresher.
    #[arg(long, default_value = "https://auth.openai.com/oauth/token", env = "RELAY_TOKEN_URL")]
    pub token_url: String,

    /// OAuth client id used by the refresher.
    #[arg(long, env = "RELAY_CLIENT_ID")]
    pub client_id: String,

    /// Personality key resolved via `PersonalityResolver`, if any.
    #[arg(long, env = "RELAY_PERSONALITY_KEY")]
    pub personality_key: Option<String>,

    /// Upstream endpoint the Quota Refresh Coordinator polls per identity.
    #[arg(
        long,
        default_value = "https://chatgpt.com/backend-api/codex/usage",
        env = "RELAY_QUOTA_URL"
    )]
    pub quota_url: String,
}

impl RelayConfig {
    pub fn accounts_path(&self) -> PathBuf {
        self.state_dir.join("auth.json")
    }

    pub fn snapshots_path(&self) -> PathBuf {
        self.state_dir.join("snapshots.json")
    }

    pub fn affinity_path(&self) -> PathBuf {
        self.state_dir.join("affinity.json")
    }

    /// Unrecognized values default to round-robin rather than failing
    /// startup, mirroring `ProviderConfig::as_auth_mode`'s unknown-mode
    /// default.
    pub fn resolved_strategy(&self) -> Strategy {
        match self.strategy.as_str() {
            "sticky" => Strategy::Sticky,
            "hybrid" => Strategy::Hybrid,
            _ => Strategy::RoundRobin,
        }
    }

    pub fn resolved_prompt_cache_key_strategy(&self) -> PromptCacheKeyStrategy {
        match self.prompt_cache_key_strategy.as_str() {
            "passthrough" => PromptCacheKeyStrategy::Passthrough,
            _ => PromptCacheKeyStrategy::Project,
        }
    }

    pub fn resolved_spoof_mode(&self) -> SpoofMode {
        match self.spoof_mode.as_str() {
            "native" => SpoofMode::Native,
            _ => SpoofMode::Spoof,
        }
    }
}
