// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trait-object seams for the collaborators this crate never reimplements:
//! the outbound HTTP transport, model-catalog fetch, personality text
//! resolution, and toast notification sink (spec.md §6.4). Production wiring
//! is in `transport::RealTransport`; tests substitute fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::model_catalog::CatalogModel;

/// One outbound HTTP round trip as the orchestrator sees it.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

/// The only network boundary the orchestrator dispatches through. Real
/// implementation wraps `reqwest::Client`; tests substitute a fake that
/// never touches the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> anyhow::Result<TransportResponse>;
}

/// Fetches the upstream model catalog. Optional: callers without network
/// access to the catalog endpoint fall back to a cached snapshot passed in
/// at startup.
#[async_trait]
pub trait ModelCatalogFetcher: Send + Sync {
    async fn fetch(
        &self,
        mode: &str,
        access_token: &str,
        account_id: Option<&str>,
    ) -> anyhow::Result<Vec<CatalogModel>>;
}

/// Resolves a personality key to its rendered text. Pure function from the
/// core's perspective; the real implementation may read personality files
/// off disk, which this crate never installs or manages.
pub trait PersonalityResolver: Send + Sync {
    fn resolve(&self, key: &str) -> Option<String>;
}

/// Variant of a toast/notification event, mirrored from the host UI's
/// vocabulary. Best-effort: failures to display are always swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Info,
    Warning,
    Error,
}

/// Fire-and-forget notification sink. Never blocks the orchestrator and
/// never surfaces an error to it.
pub trait ToastSink: Send + Sync {
    fn show(&self, message: &str, variant: ToastVariant, quiet: bool);
}

/// A `ToastSink` that drops every notification, used where no host UI is
/// wired up (e.g. headless deployments, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullToastSink;

impl ToastSink for NullToastSink {
    fn show(&self, _message: &str, _variant: ToastVariant, _quiet: bool) {}
}

/// A `PersonalityResolver` that never resolves anything, forcing every
/// caller onto the base-instructions fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPersonalityResolver;

impl PersonalityResolver for NullPersonalityResolver {
    fn resolve(&self, _key: &str) -> Option<String> {
        None
    }
}
