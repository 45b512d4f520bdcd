// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic wall-clock time and random identifiers, factored out so
//! components never call `SystemTime::now()` or `Uuid::new_v4()` directly.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Current wall-clock time in epoch milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock;

impl Clock {
    pub fn now_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }

    /// A random nonce suitable for PKCE state/verifier values or request ids.
    pub fn random_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
