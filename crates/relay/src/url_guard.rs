// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTPS-only enforcement, host allowlisting, and endpoint rewriting for a
//! spoofed client identity.

use reqwest::Url;

/// Fixed endpoint any `/v1/responses` or `/chat/completions` request is
/// rewritten to when dispatched under the spoofed client identity.
pub const SPOOFED_ENDPOINT: &str = "https://chatgpt.com/backend-api/codex/responses";

const ALLOWED_EXACT_HOSTS: &[&str] =
    &["api.openai.com", "auth.openai.com", "chat.openai.com", "chatgpt.com"];
const ALLOWED_SUFFIXES: &[&str] = &[".openai.com", ".chatgpt.com"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    DisallowedHost(String),
    DisallowedProtocol(String),
}

impl std::fmt::Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DisallowedHost(host) => write!(f, "disallowed outbound host: {host}"),
            Self::DisallowedProtocol(scheme) => write!(f, "disallowed outbound protocol: {scheme}"),
        }
    }
}

impl std::error::Error for GuardError {}

fn is_allowed_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    ALLOWED_EXACT_HOSTS.contains(&host.as_str())
        || ALLOWED_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

/// Rewrite the request path to the spoofed endpoint when it targets a
/// recognized chat-completion route, then enforce HTTPS + host allowlist on
/// the resulting URL. Both checks always run, in that order.
pub fn enforce(url: &str) -> Result<Url, GuardError> {
    let rewritten = rewrite_endpoint(url);
    let parsed = Url::parse(&rewritten)
        .map_err(|_| GuardError::DisallowedHost(rewritten.clone()))?;

    if parsed.scheme() != "https" {
        return Err(GuardError::DisallowedProtocol(parsed.scheme().to_owned()));
    }

    let host = parsed.host_str().ok_or_else(|| GuardError::DisallowedHost(rewritten.clone()))?;
    if !is_allowed_host(host) {
        return Err(GuardError::DisallowedHost(host.to_owned()));
    }

    Ok(parsed)
}

fn rewrite_endpoint(url: &str) -> String {
    if url.contains("/v1/responses") || url.contains("/chat/completions") {
        SPOOFED_ENDPOINT.to_owned()
    } else {
        url.to_owned()
    }
}

#[cfg(test)]
#[path = "url_guard_tests.rs"]
mod tests;
