use super::*;
use std::collections::HashMap;

fn ctx(mode: SpoofMode) -> TransformContext<'static> {
    TransformContext {
        mode,
        program_name: "codex_cli_rs",
        plugin_version: "1.2.3",
        platform: "linux",
        arch: "x86_64",
        terminal_descriptor: "xterm-256color",
        base_instructions: "base",
        instructions_template: None,
        personality_text: None,
        prompt_cache_key_strategy: crate::transform::PromptCacheKeyStrategy::Passthrough,
        prompt_cache_key_version: 1,
        project: "proj",
        normalized_path: "/repo",
    }
}

fn request(headers: HashMap<String, String>) -> OutboundRequest {
    OutboundRequest { url: "https://chatgpt.com/backend-api/codex/responses".to_owned(), headers, body: None }
}

#[test]
fn spoof_mode_sets_originator_and_user_agent() {
    let mut req = request(HashMap::new());
    let report = normalize(&mut req, &ctx(SpoofMode::Spoof));

    assert!(report.changed);
    assert_eq!(req.headers.get("originator").map(String::as_str), Some("codex_cli_rs"));
    assert!(req.headers.get("user-agent").unwrap().starts_with("codex_cli_rs/1.2.3"));
}

#[test]
fn spoof_mode_preserves_recognized_originator() {
    let mut headers = HashMap::new();
    headers.insert("originator".to_owned(), "codex_vscode".to_owned());
    let mut req = request(headers);
    normalize(&mut req, &ctx(SpoofMode::Spoof));

    assert_eq!(req.headers.get("originator").map(String::as_str), Some("codex_vscode"));
}

#[test]
fn native_mode_preserves_inbound_user_agent() {
    let mut headers = HashMap::new();
    headers.insert("user-agent".to_owned(), "MyClient/1.0".to_owned());
    let mut req = request(headers);
    normalize(&mut req, &ctx(SpoofMode::Native));

    assert_eq!(req.headers.get("user-agent").map(String::as_str), Some("MyClient/1.0"));
}

#[test]
fn removes_internal_collaboration_headers() {
    let mut headers = HashMap::new();
    headers.insert("X-Collab-Session".to_owned(), "abc".to_owned());
    let mut req = request(headers);
    let report = normalize(&mut req, &ctx(SpoofMode::Native));

    assert!(report.changed);
    assert!(!req.headers.contains_key("X-Collab-Session"));
}

#[test]
fn idempotent_across_two_runs() {
    let mut req = request(HashMap::new());
    normalize(&mut req, &ctx(SpoofMode::Spoof));
    let once = req.clone();
    normalize(&mut req, &ctx(SpoofMode::Spoof));
    assert_eq!(req.headers, once.headers);
}
