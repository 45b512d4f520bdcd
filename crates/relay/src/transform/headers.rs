// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 1: header normalization. Sets `originator` and `user-agent` under
//! the spoofed identity, preserves the inbound UA in native mode, and drops
//! internal collaboration headers.

use super::{OutboundRequest, PhaseReport, SpoofMode, TransformContext};

const INTERNAL_HEADERS: &[&str] = &["x-relay-internal", "x-collab-session", "x-collab-token"];

pub fn normalize(request: &mut OutboundRequest, ctx: &TransformContext<'_>) -> PhaseReport {
    let mut changed = false;

    for header in INTERNAL_HEADERS {
        if remove_case_insensitive(&mut request.headers, header).is_some() {
            changed = true;
        }
    }

    match ctx.mode {
        SpoofMode::Spoof => {
            let originator = if has_recognized_originator(&request.headers) {
                None
            } else {
                Some(ctx.program_name.to_owned())
            };
            if let Some(originator) = originator {
                set_header(&mut request.headers, "originator", originator);
                changed = true;
            }

            let ua = format!(
                "{}/{} ({}; {}) {}",
                ctx.program_name, ctx.plugin_version, ctx.platform, ctx.arch, ctx.terminal_descriptor
            );
            set_header(&mut request.headers, "user-agent", sanitize_ascii(&ua));
            changed = true;
        }
        SpoofMode::Native => {
            if let Some(ua) = request.headers.get("user-agent").cloned() {
                let sanitized = sanitize_ascii(&ua);
                if sanitized != ua {
                    set_header(&mut request.headers, "user-agent", sanitized);
                    changed = true;
                }
            }
        }
    }

    PhaseReport {
        phase: "header_normalization",
        changed,
        reason: if changed { "normalized".to_owned() } else { "no_change".to_owned() },
    }
}

fn has_recognized_originator(headers: &std::collections::HashMap<String, String>) -> bool {
    const RECOGNIZED: &[&str] = &["codex_cli_rs", "codex_vscode", "codex_ide"];
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("originator"))
        .is_some_and(|(_, v)| RECOGNIZED.contains(&v.as_str()))
}

fn sanitize_ascii(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_graphic() || *c == ' ').collect()
}

fn set_header(headers: &mut std::collections::HashMap<String, String>, name: &str, value: String) {
    remove_case_insensitive(headers, name);
    headers.insert(name.to_owned(), value);
}

fn remove_case_insensitive(
    headers: &mut std::collections::HashMap<String, String>,
    name: &str,
) -> Option<String> {
    let key = headers.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned()?;
    headers.remove(&key)
}

#[cfg(test)]
#[path = "headers_tests.rs"]
mod tests;
