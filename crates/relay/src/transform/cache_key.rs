// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 6: prompt-cache-key override. Under the `Project` strategy the
//! inbound `prompt_cache_key` is replaced with a deterministic value scoped
//! to project, spoof mode, and workspace path, so two different projects
//! sharing one account never collide in upstream's prompt cache.

use sha2::{Digest, Sha256};
use serde_json::Value;

use super::{OutboundRequest, PhaseReport, PromptCacheKeyStrategy, TransformContext};

pub fn override_prompt_cache_key(request: &mut OutboundRequest, ctx: &TransformContext<'_>) -> PhaseReport {
    if ctx.prompt_cache_key_strategy != PromptCacheKeyStrategy::Project {
        return skip("passthrough_strategy");
    }
    let Some(body) = request.body.as_mut() else {
        return skip("no_body");
    };
    let Some(obj) = body.as_object_mut() else {
        return skip("body_not_object");
    };

    let key = derive_key(ctx);
    let changed = obj.get("prompt_cache_key").and_then(Value::as_str) != Some(key.as_str());
    obj.insert("prompt_cache_key".to_owned(), Value::String(key));

    PhaseReport {
        phase: "prompt_cache_key_override",
        changed,
        reason: if changed { "derived".to_owned() } else { "no_change".to_owned() },
    }
}

fn derive_key(ctx: &TransformContext<'_>) -> String {
    let mode = match ctx.mode {
        super::SpoofMode::Native => "native",
        super::SpoofMode::Spoof => "spoof",
    };
    let material = format!(
        "{}|{}|{}|{}",
        ctx.prompt_cache_key_version, ctx.project, mode, ctx.normalized_path
    );

    let digest = Sha256::digest(material.as_bytes());
    let hex = to_hex(&digest)[..24].to_owned();
    format!("ocpk_v{}_{}", ctx.prompt_cache_key_version, hex)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn skip(reason: &str) -> PhaseReport {
    PhaseReport { phase: "prompt_cache_key_override", changed: false, reason: reason.to_owned() }
}

#[cfg(test)]
#[path = "cache_key_tests.rs"]
mod tests;
