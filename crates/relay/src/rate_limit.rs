// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Retry-After` parsing and rate-limit-header → quota-snapshot conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One named limit window within a quota snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Limit {
    pub name: String,
    pub left_pct: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<u64>,
}

/// A point-in-time read of upstream rate-limit headers for one model family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaSnapshot {
    pub updated_at: u64,
    pub model_family: String,
    pub limits: Vec<Limit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<f64>,
}

/// Case-insensitive header lookup over a generic string-keyed map (headers
/// arrive from `reqwest::header::HeaderMap` or JSON, both normalized to this
/// shape before reaching this module).
pub fn header_lookup<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parse a `Retry-After`-shaped header value into milliseconds relative to
/// `now`. Accepts integer seconds, decimal seconds (`"1.5s"`), decimal
/// milliseconds (`"1500ms"`), bare millisecond integers (>= 1e12, to
/// disambiguate from seconds), and HTTP-date values. Negative or fractional
/// bare-integer seconds are rejected. Past dates clamp to 0.
pub fn parse_retry_after_ms(headers: &HashMap<String, String>, now: u64) -> Option<u64> {
    let raw = header_lookup(headers, "retry-after")?.trim();
    parse_retry_after_value(raw, now)
}

fn parse_retry_after_value(raw: &str, now: u64) -> Option<u64> {
    if raw.is_empty() {
        return None;
    }

    if let Some(digits) = raw.strip_suffix("ms") {
        let ms: f64 = digits.trim().parse().ok()?;
        if ms < 0.0 {
            return None;
        }
        return Some(ms.round() as u64);
    }

    if let Some(digits) = raw.strip_suffix('s') {
        let secs: f64 = digits.trim().parse().ok()?;
        if secs < 0.0 {
            return None;
        }
        return Some((secs * 1000.0).round() as u64);
    }

    if let Ok(n) = raw.parse::<i64>() {
        if n < 0 {
            return None;
        }
        let n = n as u64;
        // Bare values this large can only be absolute millisecond timestamps.
        if n >= 1_000_000_000_000 {
            return Some(n.saturating_sub(now).max(0));
        }
        return Some(n * 1000);
    }

    // Fractional bare seconds without a unit suffix are rejected per spec —
    // only the explicit "s"/"ms" suffixed forms accept decimals.
    if raw.parse::<f64>().is_ok() {
        return None;
    }

    let at = httpdate_to_ms(raw)?;
    let now = now as i128;
    Some(if at <= now { 0 } else { (at - now) as u64 })
}

/// RFC 1123 / RFC 850 / asctime HTTP-date parser, returning epoch ms.
fn httpdate_to_ms(raw: &str) -> Option<i128> {
    let t = httpdate::parse_http_date(raw).ok()?;
    let ms = t.duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as i128).unwrap_or(0);
    Some(ms)
}

/// Build a quota snapshot from a set of `x-ratelimit-*` headers. One `Limit`
/// is emitted per recognized (remaining, limit, reset) tuple where `limit >
/// 0`; unrecognized or zero-limit tuples are skipped.
pub fn snapshot_from_headers(
    now: u64,
    model_family: &str,
    headers: &HashMap<String, String>,
) -> QuotaSnapshot {
    let mut limits = Vec::new();

    for (remaining_key, limit_key, reset_key, name) in [
        (
            "x-ratelimit-remaining-requests",
            "x-ratelimit-limit-requests",
            "x-ratelimit-reset-requests",
            "requests",
        ),
        (
            "x-ratelimit-remaining-tokens",
            "x-ratelimit-limit-tokens",
            "x-ratelimit-reset-tokens",
            "tokens",
        ),
    ] {
        let Some(remaining) = header_lookup(headers, remaining_key).and_then(|v| v.parse::<f64>().ok())
        else {
            continue;
        };
        let Some(limit) = header_lookup(headers, limit_key).and_then(|v| v.parse::<f64>().ok()) else {
            continue;
        };
        if limit <= 0.0 {
            continue;
        }
        let left_pct = ((remaining / limit) * 100.0).round().clamp(0.0, 100.0) as u8;
        let resets_at = header_lookup(headers, reset_key).and_then(|v| parse_reset_offset(v, now));

        limits.push(Limit { name: name.to_owned(), left_pct, resets_at });
    }

    QuotaSnapshot { updated_at: now, model_family: model_family.to_owned(), limits, credits: None }
}

/// Parse a reset value, which upstream sends as a duration like `"12.5s"` or
/// `"1h2m3s"`, into an absolute epoch-ms timestamp.
fn parse_reset_offset(raw: &str, now: u64) -> Option<u64> {
    let raw = raw.trim();
    if let Some(digits) = raw.strip_suffix('s') {
        let secs: f64 = digits.parse().ok()?;
        return Some(now + (secs * 1000.0).round() as u64);
    }
    let secs: f64 = raw.parse().ok()?;
    Some(now + (secs * 1000.0).round() as u64)
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
