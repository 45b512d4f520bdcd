// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 5: compatibility sanitizer. Upstream doesn't understand
//! `item_reference` pointers or orphan tool-output items that have lost
//! their matching call id, so this phase flattens both into shapes the
//! Responses API accepts.

use serde_json::{json, Value};

use super::{OutboundRequest, PhaseReport};

const ORPHAN_TYPES: &[&str] = &["function_call_output", "tool_output", "tool_result"];

pub fn sanitize(request: &mut OutboundRequest) -> PhaseReport {
    let Some(body) = request.body.as_mut() else {
        return skip("no_body");
    };

    let mut changed = remove_item_references(body);

    if let Some(input) = body.get_mut("input").and_then(Value::as_array_mut) {
        for item in input.iter_mut() {
            if rewrite_orphan_tool_output(item) {
                changed = true;
            }
        }
    }

    PhaseReport {
        phase: "compat_sanitizer",
        changed,
        reason: if changed { "sanitized".to_owned() } else { "no_change".to_owned() },
    }
}

fn remove_item_references(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let removed = map.remove("item_reference").is_some();
            let mut child_changed = false;
            for v in map.values_mut() {
                if remove_item_references(v) {
                    child_changed = true;
                }
            }
            removed || child_changed
        }
        Value::Array(items) => {
            let mut changed = false;
            for v in items.iter_mut() {
                if remove_item_references(v) {
                    changed = true;
                }
            }
            changed
        }
        _ => false,
    }
}

fn rewrite_orphan_tool_output(item: &mut Value) -> bool {
    let Some(obj) = item.as_object_mut() else { return false };
    let Some(item_type) = obj.get("type").and_then(Value::as_str) else { return false };
    if !ORPHAN_TYPES.contains(&item_type) {
        return false;
    }
    let has_call_id = obj.get("call_id").and_then(Value::as_str).is_some()
        || obj.get("tool_call_id").and_then(Value::as_str).is_some();
    if has_call_id {
        return false;
    }

    let text = reconstruct_text(obj);
    *item = json!({
        "role": "assistant",
        "content": [{"type": "output_text", "text": text}],
    });
    true
}

fn reconstruct_text(obj: &serde_json::Map<String, Value>) -> String {
    match obj.get("output") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => match obj.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
    }
}

fn skip(reason: &str) -> PhaseReport {
    PhaseReport { phase: "compat_sanitizer", changed: false, reason: reason.to_owned() }
}

#[cfg(test)]
#[path = "compat_tests.rs"]
mod tests;
