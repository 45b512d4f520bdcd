// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JWT claim extraction and the canonical `identityKey` composition.
//!
//! Signature verification is never needed here — only the payload's account
//! id, plan, and email claims, read with a minimal base64url + JSON reader.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

/// Claims pulled out of an access-token JWT payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaims {
    pub account_id: Option<String>,
    pub email: Option<String>,
    pub plan: Option<String>,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default, rename = "chatgpt_account_id")]
    account_id: Option<String>,
    #[serde(default, rename = "chatgpt_plan_type")]
    plan: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Decode the payload segment of a `header.payload.signature` JWT as
/// base64url JSON and extract the claims this system cares about. Returns
/// `None` for malformed tokens — callers should leave existing account
/// fields unchanged in that case rather than clearing them.
pub fn parse_jwt_claims(access_token: &str) -> Option<IdentityClaims> {
    let mut parts = access_token.split('.');
    let _header = parts.next()?;
    let payload_b64 = parts.next()?;
    if parts.next().is_none() {
        return None;
    }

    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let raw: RawClaims = serde_json::from_slice(&payload).ok()?;

    Some(IdentityClaims { account_id: raw.account_id, email: raw.email, plan: raw.plan })
}

/// Best-effort extraction tolerant of claims nested under common alternate
/// paths (`id_token`-shaped payloads some providers emit). Falls back to the
/// flat `RawClaims` shape.
pub fn parse_jwt_claims_lenient(access_token: &str) -> Option<IdentityClaims> {
    if let Some(claims) = parse_jwt_claims(access_token) {
        if claims.account_id.is_some() || claims.email.is_some() || claims.plan.is_some() {
            return Some(claims);
        }
    }

    let mut parts = access_token.split('.');
    let _header = parts.next()?;
    let payload_b64 = parts.next()?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let value: Value = serde_json::from_slice(&payload).ok()?;

    let dig = |path: &[&str]| -> Option<String> {
        let mut cur = &value;
        for key in path {
            cur = cur.get(key)?;
        }
        cur.as_str().map(str::to_owned)
    };

    Some(IdentityClaims {
        account_id: dig(&["chatgpt_account_id"]).or_else(|| dig(&["https://api.openai.com/auth", "chatgpt_account_id"])),
        email: dig(&["email"]).or_else(|| dig(&["https://api.openai.com/profile", "email"])),
        plan: dig(&["chatgpt_plan_type"]).or_else(|| dig(&["https://api.openai.com/auth", "chatgpt_plan_type"])),
    })
}

/// Compose the canonical cross-component key: `accountId|lower(email)|plan`,
/// with absent parts represented as empty segments. Pure function of its
/// inputs.
pub fn identity_key(account_id: Option<&str>, email: Option<&str>, plan: Option<&str>) -> String {
    let account_id = account_id.unwrap_or("");
    let email = email.map(|e| e.to_lowercase()).unwrap_or_default();
    let plan = plan.unwrap_or("");
    format!("{account_id}|{email}|{plan}")
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
