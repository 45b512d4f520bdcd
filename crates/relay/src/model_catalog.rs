// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model catalog types (spec.md §3 "Model Runtime Defaults") and the
//! instructions-template renderer `transform::instructions` consumes. The
//! catalog itself is supplied by the host via `ModelCatalogFetcher`; this
//! module never fetches it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
    Xhigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRuntimeDefaults {
    pub apply_patch_tool_type: Option<String>,
    pub default_reasoning_effort: ReasoningEffort,
    pub supported_reasoning_efforts: Vec<ReasoningEffort>,
    pub supports_reasoning_summaries: bool,
    #[serde(default)]
    pub reasoning_summary_format: Option<String>,
    pub supports_verbosity: bool,
    pub default_verbosity: Verbosity,
}

/// One entry of the upstream model catalog, keyed by `slug`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogModel {
    pub slug: String,
    #[serde(default)]
    pub instructions_template: Option<String>,
    pub runtime_defaults: ModelRuntimeDefaults,
}

/// Look up a catalog entry by model slug, stripping a trailing
/// `-<effort>` suffix first (`gpt-5-high` → `gpt-5`) the way
/// `transform::instructions::strip_effort_suffix` does.
pub fn find_model<'a>(catalog: &'a [CatalogModel], model_slug: &str) -> Option<&'a CatalogModel> {
    let base = crate::transform::instructions::strip_effort_suffix(model_slug);
    catalog.iter().find(|m| m.slug == model_slug).or_else(|| catalog.iter().find(|m| m.slug == base))
}

#[cfg(test)]
#[path = "model_catalog_tests.rs"]
mod tests;
