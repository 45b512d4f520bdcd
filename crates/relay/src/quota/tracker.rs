// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hysteresis over quota snapshots: emits a warning the first time a window
//! drops below 25% or 10% since its last reset, and `exhausted` the first
//! time it reaches 0%. Thresholds reset once the window's `resetsAt` passes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rate_limit::QuotaSnapshot;

const WARN_25: u8 = 25;
const WARN_10: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingKind {
    Warning25,
    Warning10,
    Exhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crossing {
    pub window: String,
    pub kind: CrossingKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WindowState {
    crossed_25: bool,
    crossed_10: bool,
    crossed_exhausted: bool,
    last_resets_at: Option<u64>,
}

/// Per-identity tracker state, persisted only insofar as the caller chooses
/// to snapshot it; in this crate it lives alongside the Quota Refresh
/// Coordinator's in-memory map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerState {
    windows: HashMap<String, WindowState>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a new snapshot, returning the crossings it produced. Mutates
    /// `self` in place so the caller can persist the returned state.
    pub fn observe(&mut self, snapshot: &QuotaSnapshot) -> Vec<Crossing> {
        let mut crossings = Vec::new();

        for limit in &snapshot.limits {
            let window = self.windows.entry(limit.name.clone()).or_default();

            let reset_passed = match (window.last_resets_at, limit.resets_at) {
                (Some(prev), Some(current)) => current != prev,
                (None, Some(_)) => false,
                _ => false,
            };
            if reset_passed {
                window.crossed_25 = false;
                window.crossed_10 = false;
                window.crossed_exhausted = false;
            }
            window.last_resets_at = limit.resets_at;

            if limit.left_pct == 0 && !window.crossed_exhausted {
                window.crossed_exhausted = true;
                window.crossed_10 = true;
                window.crossed_25 = true;
                crossings.push(Crossing {
                    window: limit.name.clone(),
                    kind: CrossingKind::Exhausted,
                    resets_at: limit.resets_at,
                });
                continue;
            }

            if limit.left_pct < WARN_10 && !window.crossed_10 {
                window.crossed_10 = true;
                window.crossed_25 = true;
                crossings.push(Crossing {
                    window: limit.name.clone(),
                    kind: CrossingKind::Warning10,
                    resets_at: limit.resets_at,
                });
            } else if limit.left_pct < WARN_25 && !window.crossed_25 {
                window.crossed_25 = true;
                crossings.push(Crossing {
                    window: limit.name.clone(),
                    kind: CrossingKind::Warning25,
                    resets_at: limit.resets_at,
                });
            }
        }

        crossings
    }
}

/// `max(resetsAt)` of the crossed windows that carry one, or `now + 5min` if
/// none is known. Used by the orchestrator to set a cooldown on exhaustion.
pub fn cooldown_for_exhaustion(crossings: &[Crossing], now: u64) -> u64 {
    const DEFAULT_EXHAUSTION_COOLDOWN_MS: u64 = 5 * 60 * 1000;
    crossings
        .iter()
        .filter(|c| c.kind == CrossingKind::Exhausted)
        .filter_map(|c| c.resets_at)
        .max()
        .unwrap_or(now + DEFAULT_EXHAUSTION_COOLDOWN_MS)
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
