use super::*;

#[test]
fn allows_exact_hosts() {
    for host in ALLOWED_EXACT_HOSTS {
        let url = format!("https://{host}/v1/models");
        assert!(enforce(&url).is_ok(), "{host} should be allowed");
    }
}

#[test]
fn allows_subdomains_by_suffix() {
    assert!(enforce("https://cdn.openai.com/asset").is_ok());
    assert!(enforce("https://edge.chatgpt.com/asset").is_ok());
}

#[test]
fn rejects_disallowed_host() {
    let err = enforce("https://evil.example.com/v1/models").unwrap_err();
    assert!(matches!(err, GuardError::DisallowedHost(_)));
}

#[test]
fn rejects_non_https_scheme() {
    let err = enforce("http://api.openai.com/v1/models").unwrap_err();
    assert!(matches!(err, GuardError::DisallowedProtocol(_)));
}

#[test]
fn rewrites_v1_responses_to_spoofed_endpoint() {
    let url = enforce("https://api.openai.com/v1/responses").expect("allowed");
    assert_eq!(url.as_str(), SPOOFED_ENDPOINT);
}

#[test]
fn rewrites_chat_completions_to_spoofed_endpoint() {
    let url = enforce("https://api.openai.com/v1/chat/completions").expect("allowed");
    assert_eq!(url.as_str(), SPOOFED_ENDPOINT);
}

#[test]
fn leaves_other_paths_untouched() {
    let url = enforce("https://api.openai.com/v1/models").expect("allowed");
    assert_eq!(url.as_str(), "https://api.openai.com/v1/models");
}

#[test]
fn host_check_still_runs_after_rewrite() {
    // Rewrite always targets an allowed host, so this exercises that the
    // rewrite result itself passes the allowlist rather than skipping it.
    let url = enforce("https://api.openai.com/chat/completions").expect("allowed");
    assert!(is_allowed_host(url.host_str().unwrap()));
}
