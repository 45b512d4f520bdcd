// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategy-based account selection: round-robin / sticky / hybrid, with
//! cooldown/lease/enable-aware eligibility and a per-attempt selection trace.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::account::{Account, AuthMode, Strategy};
use crate::session_affinity::SessionAffinityStore;

/// Why a request found no eligible account to dispatch through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoEligibleReason {
    EmptyPool,
    AllDisabled,
    AllCoolingDown,
    AllRefreshLocked,
}

/// Transient per-attempt debug record. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionTrace {
    pub strategy: Strategy,
    pub decision: &'static str,
    pub total_count: usize,
    pub disabled_count: usize,
    pub cooldown_count: usize,
    pub refresh_lease_count: usize,
    pub eligible_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_identity_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

pub enum SelectionOutcome {
    Selected { account: Account, trace: SelectionTrace },
    NoEligible { reason: NoEligibleReason, trace: SelectionTrace },
}

#[derive(Default)]
struct RoundRobinState {
    last_index: usize,
}

/// Per-mode round-robin cursor. In-memory only — orchestrator state does not
/// survive process restart, per spec.
pub struct Selector {
    cursors: Mutex<HashMap<AuthMode, RoundRobinState>>,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector {
    pub fn new() -> Self {
        Self { cursors: Mutex::new(HashMap::new()) }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn select(
        &self,
        accounts: &[Account],
        mode: AuthMode,
        strategy: Strategy,
        session_key: Option<&str>,
        is_subagent: bool,
        now: u64,
        pid_offset: usize,
        affinity: &SessionAffinityStore,
    ) -> SelectionOutcome {
        let effective_strategy = if is_subagent { Strategy::RoundRobin } else { strategy };
        let mode_key = mode_key(mode);

        let total_count = accounts.len();
        let disabled_count = accounts.iter().filter(|a| !a.enabled).count();
        let cooldown_count = accounts.iter().filter(|a| a.enabled && a.is_cooling_down(now)).count();
        let refresh_lease_count =
            accounts.iter().filter(|a| a.enabled && !a.is_cooling_down(now) && a.is_lease_held(now)).count();
        let eligible: Vec<&Account> = accounts.iter().filter(|a| a.is_eligible(now)).collect();

        let base_trace = |decision: &'static str| SelectionTrace {
            strategy: effective_strategy,
            decision,
            total_count,
            disabled_count,
            cooldown_count,
            refresh_lease_count,
            eligible_count: eligible.len(),
            selected_identity_key: None,
            selected_index: None,
            session_key: session_key.map(str::to_owned),
        };

        if eligible.is_empty() {
            let reason = if total_count == 0 {
                NoEligibleReason::EmptyPool
            } else if disabled_count == total_count {
                NoEligibleReason::AllDisabled
            } else if cooldown_count + disabled_count == total_count {
                NoEligibleReason::AllCoolingDown
            } else {
                NoEligibleReason::AllRefreshLocked
            };
            return SelectionOutcome::NoEligible { reason, trace: base_trace("no_eligible") };
        }

        match effective_strategy {
            Strategy::RoundRobin => {
                let (account, index) = self.pick_round_robin(accounts, &eligible, mode, pid_offset).await;
                let mut trace = base_trace("round_robin");
                trace.selected_identity_key = Some(account.identity_key.clone());
                trace.selected_index = Some(index);
                SelectionOutcome::Selected { account, trace }
            }
            Strategy::Sticky => {
                let Some(session_key) = session_key else {
                    let (account, index) =
                        self.pick_round_robin(accounts, &eligible, mode, pid_offset).await;
                    let mut trace = base_trace("sticky_no_session_fallback_round_robin");
                    trace.selected_identity_key = Some(account.identity_key.clone());
                    trace.selected_index = Some(index);
                    return SelectionOutcome::Selected { account, trace };
                };

                if let Some(sticky_key) = affinity.sticky_for(&mode_key, session_key).await {
                    if let Some(acct) = eligible.iter().find(|a| a.identity_key == sticky_key) {
                        let account = (*acct).clone();
                        let mut trace = base_trace("sticky_hit");
                        trace.selected_identity_key = Some(account.identity_key.clone());
                        return SelectionOutcome::Selected { account, trace };
                    }
                }

                let (account, index) = self.pick_round_robin(accounts, &eligible, mode, pid_offset).await;
                affinity.record_sticky(&mode_key, session_key, &account.identity_key).await;
                let mut trace = base_trace("sticky_fallback_round_robin");
                trace.selected_identity_key = Some(account.identity_key.clone());
                trace.selected_index = Some(index);
                SelectionOutcome::Selected { account, trace }
            }
            Strategy::Hybrid => {
                let Some(session_key) = session_key else {
                    let (account, index) =
                        self.pick_round_robin(accounts, &eligible, mode, pid_offset).await;
                    let mut trace = base_trace("hybrid_no_session_fallback_round_robin");
                    trace.selected_identity_key = Some(account.identity_key.clone());
                    trace.selected_index = Some(index);
                    return SelectionOutcome::Selected { account, trace };
                };

                if let Some(sticky_key) = affinity.sticky_for(&mode_key, session_key).await {
                    if let Some(acct) = eligible.iter().find(|a| a.identity_key == sticky_key) {
                        // Original recovered — drop any standing substitution.
                        affinity.clear_hybrid(&mode_key, session_key).await;
                        let account = (*acct).clone();
                        let mut trace = base_trace("hybrid_original_eligible");
                        trace.selected_identity_key = Some(account.identity_key.clone());
                        return SelectionOutcome::Selected { account, trace };
                    }
                }

                if let Some(hybrid_key) = affinity.hybrid_for(&mode_key, session_key).await {
                    if let Some(acct) = eligible.iter().find(|a| a.identity_key == hybrid_key) {
                        let account = (*acct).clone();
                        let mut trace = base_trace("hybrid_substitute_hit");
                        trace.selected_identity_key = Some(account.identity_key.clone());
                        return SelectionOutcome::Selected { account, trace };
                    }
                }

                // Neither the sticky original nor the standing substitute is
                // eligible: pick the eligible account recovering soonest.
                let account = eligible
                    .iter()
                    .min_by_key(|a| a.cooldown_until.unwrap_or(0))
                    .map(|a| (*a).clone())
                    .expect("eligible is non-empty");
                affinity.record_hybrid(&mode_key, session_key, &account.identity_key).await;
                if affinity.sticky_for(&mode_key, session_key).await.is_none() {
                    affinity.record_sticky(&mode_key, session_key, &account.identity_key).await;
                }
                let mut trace = base_trace("hybrid_substitute");
                trace.selected_identity_key = Some(account.identity_key.clone());
                SelectionOutcome::Selected { account, trace }
            }
        }
    }

    async fn pick_round_robin(
        &self,
        accounts: &[Account],
        eligible: &[&Account],
        mode: AuthMode,
        pid_offset: usize,
    ) -> (Account, usize) {
        let n = accounts.len();
        let mut cursors = self.cursors.lock().await;
        let cursor = cursors.entry(mode).or_default();
        let start = (cursor.last_index + 1 + pid_offset) % n.max(1);

        for offset in 0..n {
            let idx = (start + offset) % n;
            if let Some(acct) = eligible.iter().find(|a| a.identity_key == accounts[idx].identity_key) {
                cursor.last_index = idx;
                return ((*acct).clone(), idx);
            }
        }

        // Unreachable given eligible is non-empty and drawn from accounts,
        // but fall back defensively — prefer the account with the oldest
        // `last_used` when more than one is eligible at this rotation
        // position, per the round-robin tie-break.
        let fallback = eligible
            .iter()
            .min_by_key(|a| a.last_used.unwrap_or(0))
            .expect("eligible is non-empty");
        ((*fallback).clone(), 0)
    }
}

pub(crate) fn mode_key(mode: AuthMode) -> String {
    match mode {
        AuthMode::Native => "native".to_owned(),
        AuthMode::Codex => "codex".to_owned(),
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
