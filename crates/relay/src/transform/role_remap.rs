// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 3: rewrite non-permission `developer`-role messages to `user`.

use serde_json::Value;

use super::{OutboundRequest, PhaseReport};

const PERMISSION_MARKERS: &[&str] = ["<permissions instructions>", "sandbox policy"]
    .as_slice();

pub fn remap_developer_role(request: &mut OutboundRequest) -> PhaseReport {
    let Some(body) = request.body.as_mut() else {
        return skip("no_body");
    };
    let Some(messages) = find_messages_array(body) else {
        return skip("no_messages_array");
    };

    let mut changed = false;
    for message in messages {
        let Some(obj) = message.as_object_mut() else { continue };
        let is_developer = obj.get("role").and_then(Value::as_str) == Some("developer");
        if !is_developer {
            continue;
        }
        if is_permission_message(obj) {
            continue;
        }
        obj.insert("role".to_owned(), Value::String("user".to_owned()));
        changed = true;
    }

    PhaseReport {
        phase: "developer_role_remap",
        changed,
        reason: if changed { "remapped".to_owned() } else { "no_change".to_owned() },
    }
}

fn find_messages_array(body: &mut Value) -> Option<&mut Vec<Value>> {
    body.get_mut("input").and_then(Value::as_array_mut)
}

fn is_permission_message(obj: &serde_json::Map<String, Value>) -> bool {
    let text = message_text(obj).to_lowercase();
    PERMISSION_MARKERS.iter().any(|marker| text.contains(marker))
}

fn message_text(obj: &serde_json::Map<String, Value>) -> String {
    match obj.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn skip(reason: &str) -> PhaseReport {
    PhaseReport { phase: "developer_role_remap", changed: false, reason: reason.to_owned() }
}

#[cfg(test)]
#[path = "role_remap_tests.rs"]
mod tests;
