// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase 2: body-level instruction override. Renders the catalog template
//! with the resolved personality text, falling back to base instructions
//! when the template is absent or markers can't be resolved.

use serde_json::Value;

use super::{OutboundRequest, PhaseReport, TransformContext};

const TOOLING_COMPAT_HEADING: &str = "## Tooling Compatibility";
const ORCHESTRATOR_MARKER: &str = "## Orchestrator Instructions";

pub fn override_instructions(request: &mut OutboundRequest, ctx: &TransformContext<'_>) -> PhaseReport {
    let Some(body) = request.body.as_mut() else {
        return skip("no_body");
    };
    let Some(obj) = body.as_object_mut() else {
        return skip("body_not_object");
    };

    let existing = obj.get("instructions").and_then(Value::as_str).unwrap_or("");
    if existing.contains(ORCHESTRATOR_MARKER) {
        if existing.contains(TOOLING_COMPAT_HEADING) {
            return skip("already_has_orchestrator_instructions");
        }
        let appended = format!("{existing}\n\n{TOOLING_COMPAT_HEADING}\n");
        obj.insert("instructions".to_owned(), Value::String(appended));
        return PhaseReport {
            phase: "instruction_override",
            changed: true,
            reason: "appended_tooling_compat_block".to_owned(),
        };
    }

    let rendered = render(ctx);
    let changed = obj.get("instructions").and_then(Value::as_str) != Some(rendered.as_str());
    obj.insert("instructions".to_owned(), Value::String(rendered));

    PhaseReport {
        phase: "instruction_override",
        changed,
        reason: if changed { "rendered_catalog_template".to_owned() } else { "no_change".to_owned() },
    }
}

fn render(ctx: &TransformContext<'_>) -> String {
    let Some(template) = ctx.instructions_template else {
        return ctx.base_instructions.to_owned();
    };
    if !template.contains("{{personality}}") {
        return ctx.base_instructions.to_owned();
    }
    let Some(personality) = ctx.personality_text else {
        return ctx.base_instructions.to_owned();
    };

    let rendered = template.replace("{{personality}}", personality);
    collapse_blank_runs(&rendered)
}

fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = false;
    for line in text.lines() {
        if line.trim().is_empty() {
            if blank_run {
                continue;
            }
            blank_run = true;
        } else {
            blank_run = false;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_owned()
}

fn skip(reason: &str) -> PhaseReport {
    PhaseReport { phase: "instruction_override", changed: false, reason: reason.to_owned() }
}

/// Strip a trailing `-<effort>` suffix (e.g. `gpt-5-high`) to find the base
/// catalog slug, per spec.md's "effort-suffix stripping" note.
pub fn strip_effort_suffix(model_slug: &str) -> &str {
    const SUFFIXES: &[&str] = &["-none", "-minimal", "-low", "-medium", "-high", "-xhigh"];
    for suffix in SUFFIXES {
        if let Some(stripped) = model_slug.strip_suffix(suffix) {
            return stripped;
        }
    }
    model_slug
}

#[cfg(test)]
#[path = "instructions_tests.rs"]
mod tests;
