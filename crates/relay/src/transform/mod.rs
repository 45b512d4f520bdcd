// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ordered request-transform pipeline invoked by the orchestrator before
//! each attempt. Every phase reports `{changed, reason}` metadata used only
//! for debug snapshots; no phase panics on malformed input.

pub mod cache_key;
pub mod compat;
pub mod headers;
pub mod instructions;
pub mod reasoning_strip;
pub mod role_remap;

use std::collections::HashMap;

use serde_json::Value;

/// An outbound request as the pipeline sees it: already host-guarded and
/// endpoint-rewritten, not yet credential-attached.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoofMode {
    Native,
    Spoof,
}

/// Per-phase outcome, surfaced only for debug snapshots.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PhaseReport {
    pub phase: &'static str,
    pub changed: bool,
    pub reason: String,
}

/// Everything a phase needs beyond the request itself.
pub struct TransformContext<'a> {
    pub mode: SpoofMode,
    pub program_name: &'a str,
    pub plugin_version: &'a str,
    pub platform: &'a str,
    pub arch: &'a str,
    pub terminal_descriptor: &'a str,
    pub base_instructions: &'a str,
    pub instructions_template: Option<&'a str>,
    pub personality_text: Option<&'a str>,
    pub prompt_cache_key_strategy: PromptCacheKeyStrategy,
    pub prompt_cache_key_version: u32,
    pub project: &'a str,
    pub normalized_path: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptCacheKeyStrategy {
    Project,
    Passthrough,
}

/// Run all six ordered phases, returning the transformed request and the
/// per-phase reports. Never panics: a phase that hits an unexpected shape
/// skips with a reason code instead of aborting the pipeline.
pub fn apply(mut request: OutboundRequest, ctx: &TransformContext<'_>) -> (OutboundRequest, Vec<PhaseReport>) {
    let mut reports = Vec::with_capacity(6);

    reports.push(headers::normalize(&mut request, ctx));
    reports.push(instructions::override_instructions(&mut request, ctx));
    reports.push(role_remap::remap_developer_role(&mut request));
    reports.push(reasoning_strip::strip_reasoning(&mut request));
    reports.push(compat::sanitize(&mut request));
    reports.push(cache_key::override_prompt_cache_key(&mut request, ctx));

    (request, reports)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
