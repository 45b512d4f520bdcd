use super::*;
use crate::transform::{OutboundRequest, PromptCacheKeyStrategy, SpoofMode};
use serde_json::json;
use std::collections::HashMap;

fn ctx<'a>(template: Option<&'a str>, personality: Option<&'a str>) -> TransformContext<'a> {
    TransformContext {
        mode: SpoofMode::Spoof,
        program_name: "codex_cli_rs",
        plugin_version: "1.0.0",
        platform: "linux",
        arch: "x86_64",
        terminal_descriptor: "xterm",
        base_instructions: "BASE",
        instructions_template: template,
        personality_text: personality,
        prompt_cache_key_strategy: PromptCacheKeyStrategy::Passthrough,
        prompt_cache_key_version: 1,
        project: "proj",
        normalized_path: "/repo",
    }
}

fn request(body: Value) -> OutboundRequest {
    OutboundRequest {
        url: "https://chatgpt.com/backend-api/codex/responses".to_owned(),
        headers: HashMap::new(),
        body: Some(body),
    }
}

#[test]
fn falls_back_to_base_instructions_without_template() {
    let mut req = request(json!({"model": "gpt-5"}));
    let report = override_instructions(&mut req, &ctx(None, None));
    assert!(report.changed);
    assert_eq!(req.body.unwrap()["instructions"], "BASE");
}

#[test]
fn renders_personality_marker() {
    let mut req = request(json!({"model": "gpt-5"}));
    let report = override_instructions(&mut req, &ctx(Some("Hello {{personality}}!"), Some("friend")));
    assert!(report.changed);
    assert_eq!(req.body.unwrap()["instructions"], "Hello friend!");
}

#[test]
fn falls_back_when_personality_unresolved() {
    let mut req = request(json!({"model": "gpt-5"}));
    let report = override_instructions(&mut req, &ctx(Some("Hi {{personality}}"), None));
    assert!(report.changed);
    assert_eq!(req.body.unwrap()["instructions"], "BASE");
}

#[test]
fn preserves_orchestrator_instructions_and_appends_compat_block_once() {
    let mut req =
        request(json!({"model": "gpt-5", "instructions": "## Orchestrator Instructions\nstuff"}));
    let report = override_instructions(&mut req, &ctx(None, None));
    assert!(report.changed);
    let instructions = req.body.as_ref().unwrap()["instructions"].as_str().unwrap().to_owned();
    assert!(instructions.contains("## Tooling Compatibility"));

    let mut req2 = request(json!({"model": "gpt-5", "instructions": instructions}));
    let report2 = override_instructions(&mut req2, &ctx(None, None));
    assert!(!report2.changed);
}

#[test]
fn skips_non_post_bodyless_request() {
    let mut req =
        OutboundRequest { url: "https://chatgpt.com/x".to_owned(), headers: HashMap::new(), body: None };
    let report = override_instructions(&mut req, &ctx(None, None));
    assert!(!report.changed);
}

#[test]
fn strip_effort_suffix_removes_known_suffixes() {
    assert_eq!(strip_effort_suffix("gpt-5-high"), "gpt-5");
    assert_eq!(strip_effort_suffix("gpt-5"), "gpt-5");
}
