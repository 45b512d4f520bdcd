use super::*;
use crate::transform::{OutboundRequest, SpoofMode};
use serde_json::json;
use std::collections::HashMap;

fn ctx(strategy: PromptCacheKeyStrategy, project: &'static str, path: &'static str) -> TransformContext<'static> {
    TransformContext {
        mode: SpoofMode::Spoof,
        program_name: "codex_cli_rs",
        plugin_version: "1.0.0",
        platform: "linux",
        arch: "x86_64",
        terminal_descriptor: "xterm",
        base_instructions: "BASE",
        instructions_template: None,
        personality_text: None,
        prompt_cache_key_strategy: strategy,
        prompt_cache_key_version: 1,
        project,
        normalized_path: path,
    }
}

fn request(body: serde_json::Value) -> OutboundRequest {
    OutboundRequest {
        url: "https://chatgpt.com/backend-api/codex/responses".to_owned(),
        headers: HashMap::new(),
        body: Some(body),
    }
}

#[test]
fn passthrough_strategy_leaves_key_untouched() {
    let mut req = request(json!({"prompt_cache_key": "original"}));
    let report = override_prompt_cache_key(&mut req, &ctx(PromptCacheKeyStrategy::Passthrough, "proj", "/repo"));

    assert!(!report.changed);
    assert_eq!(req.body.unwrap()["prompt_cache_key"], "original");
}

#[test]
fn project_strategy_derives_prefixed_key() {
    let mut req = request(json!({}));
    let report = override_prompt_cache_key(&mut req, &ctx(PromptCacheKeyStrategy::Project, "proj", "/repo"));

    assert!(report.changed);
    let key = req.body.unwrap()["prompt_cache_key"].as_str().unwrap().to_owned();
    assert!(key.starts_with("ocpk_v1_"));
    assert_eq!(key.len(), "ocpk_v1_".len() + 24);
}

#[test]
fn derived_key_is_deterministic_for_same_inputs() {
    let mut req_a = request(json!({}));
    let mut req_b = request(json!({}));
    let c = ctx(PromptCacheKeyStrategy::Project, "proj", "/repo");

    override_prompt_cache_key(&mut req_a, &c);
    override_prompt_cache_key(&mut req_b, &c);

    assert_eq!(req_a.body.unwrap()["prompt_cache_key"], req_b.body.unwrap()["prompt_cache_key"]);
}

#[test]
fn different_projects_derive_different_keys() {
    let mut req_a = request(json!({}));
    let mut req_b = request(json!({}));

    override_prompt_cache_key(&mut req_a, &ctx(PromptCacheKeyStrategy::Project, "proj-a", "/repo"));
    override_prompt_cache_key(&mut req_b, &ctx(PromptCacheKeyStrategy::Project, "proj-b", "/repo"));

    assert_ne!(req_a.body.unwrap()["prompt_cache_key"], req_b.body.unwrap()["prompt_cache_key"]);
}

#[test]
fn skips_when_body_missing() {
    let mut req =
        OutboundRequest { url: "https://chatgpt.com/x".to_owned(), headers: HashMap::new(), body: None };
    let report =
        override_prompt_cache_key(&mut req, &ctx(PromptCacheKeyStrategy::Project, "proj", "/repo"));
    assert!(!report.changed);
}
