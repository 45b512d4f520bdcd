// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `reqwest`-backed implementations of the `Transport` and `QuotaFetcher`
//! collaborator traits. The only code in this crate that actually reaches
//! the network.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::collaborators::{Transport, TransportRequest, TransportResponse};
use crate::quota::coordinator::QuotaFetcher;
use crate::rate_limit::{self, QuotaSnapshot};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct RealTransport {
    client: reqwest::Client,
}

impl RealTransport {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for RealTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for RealTransport {
    async fn send(&self, request: TransportRequest) -> anyhow::Result<TransportResponse> {
        let method = request.method.parse::<reqwest::Method>()?;
        let mut builder = self.client.request(method, &request.url).timeout(REQUEST_TIMEOUT);

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            if let (Ok(name), Ok(value)) =
                (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value))
            {
                headers.insert(name, value);
            }
        }
        builder = builder.headers(headers);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = header_map_to_owned(response.headers());
        let body = response.json::<serde_json::Value>().await.ok();

        Ok(TransportResponse { status, headers, body })
    }
}

fn header_map_to_owned(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned())))
        .collect()
}

/// Polls the backend's dedicated quota/usage endpoint for one account.
pub struct RealQuotaFetcher {
    client: reqwest::Client,
    quota_url: String,
}

impl RealQuotaFetcher {
    pub fn new(quota_url: String) -> Self {
        Self { client: reqwest::Client::new(), quota_url }
    }
}

#[async_trait]
impl QuotaFetcher for RealQuotaFetcher {
    async fn fetch(&self, access_token: &str, account_id: Option<&str>) -> anyhow::Result<QuotaSnapshot> {
        let mut request = self.client.get(&self.quota_url).bearer_auth(access_token).timeout(REQUEST_TIMEOUT);
        if let Some(account_id) = account_id {
            request = request.header("chatgpt-account-id", account_id);
        }

        let response = request.send().await?;
        let headers = header_map_to_owned(response.headers());
        let now = response
            .headers()
            .get("date")
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| httpdate::parse_http_date(raw).ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or_else(|| std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64);

        Ok(rate_limit::snapshot_from_headers(now, "usage", &headers))
    }
}

#[cfg(test)]
#[path = "real_tests.rs"]
mod tests;
