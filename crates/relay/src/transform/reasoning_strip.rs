// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 4: drop replayed reasoning. Upstream rejects requests that echo back
//! reasoning items from a prior turn, so this phase removes them before the
//! body ever leaves the process.

use serde_json::Value;

use super::{OutboundRequest, PhaseReport};

pub fn strip_reasoning(request: &mut OutboundRequest) -> PhaseReport {
    let Some(body) = request.body.as_mut() else {
        return skip("no_body");
    };

    let mut changed = false;

    if let Some(input) = body.get_mut("input").and_then(Value::as_array_mut) {
        let before = input.len();
        input.retain(|item| !is_reasoning_item(item));
        if input.len() != before {
            changed = true;
        }
        for item in input.iter_mut() {
            if strip_content_parts(item) {
                changed = true;
            }
        }
    }

    if scrub_reasoning_content(body) {
        changed = true;
    }

    PhaseReport {
        phase: "reasoning_replay_strip",
        changed,
        reason: if changed { "stripped".to_owned() } else { "no_change".to_owned() },
    }
}

fn is_reasoning_item(item: &Value) -> bool {
    item.get("type")
        .and_then(Value::as_str)
        .map(|t| t.starts_with("reasoning"))
        .unwrap_or(false)
}

fn strip_content_parts(item: &mut Value) -> bool {
    let Some(obj) = item.as_object_mut() else { return false };
    if obj.get("role").and_then(Value::as_str) != Some("assistant") {
        return false;
    }
    let Some(content) = obj.get_mut("content").and_then(Value::as_array_mut) else {
        return false;
    };
    let before = content.len();
    content.retain(|part| !is_reasoning_item(part));
    content.len() != before
}

/// Recursively removes any `reasoning_content` field, regardless of depth,
/// in case an upstream-shaped payload nests it somewhere the `input`/`content`
/// walk above doesn't reach.
fn scrub_reasoning_content(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let removed = map.remove("reasoning_content").is_some();
            let mut child_changed = false;
            for v in map.values_mut() {
                if scrub_reasoning_content(v) {
                    child_changed = true;
                }
            }
            removed || child_changed
        }
        Value::Array(items) => {
            let mut changed = false;
            for v in items.iter_mut() {
                if scrub_reasoning_content(v) {
                    changed = true;
                }
            }
            changed
        }
        _ => false,
    }
}

fn skip(reason: &str) -> PhaseReport {
    PhaseReport { phase: "reasoning_replay_strip", changed: false, reason: reason.to_owned() }
}

#[cfg(test)]
#[path = "reasoning_strip_tests.rs"]
mod tests;
