use super::*;
use crate::rate_limit::{Limit, QuotaSnapshot};

fn snapshot(left_pct: u8, resets_at: Option<u64>) -> QuotaSnapshot {
    QuotaSnapshot {
        updated_at: 0,
        model_family: "gpt".to_owned(),
        limits: vec![Limit { name: "5h".to_owned(), left_pct, resets_at }],
        credits: None,
    }
}

#[test]
fn warns_once_below_25_then_again_below_10() {
    let mut tracker = TrackerState::new();

    let crossings = tracker.observe(&snapshot(30, None));
    assert!(crossings.is_empty());

    let crossings = tracker.observe(&snapshot(20, None));
    assert_eq!(crossings.len(), 1);
    assert_eq!(crossings[0].kind, CrossingKind::Warning25);

    // Repeated sub-25% reading without crossing 10% first: no duplicate.
    let crossings = tracker.observe(&snapshot(22, None));
    assert!(crossings.is_empty());

    let crossings = tracker.observe(&snapshot(5, None));
    assert_eq!(crossings.len(), 1);
    assert_eq!(crossings[0].kind, CrossingKind::Warning10);
}

#[test]
fn exhausted_fires_once_at_zero() {
    let mut tracker = TrackerState::new();
    tracker.observe(&snapshot(5, Some(9_000)));

    let crossings = tracker.observe(&snapshot(0, Some(9_000)));
    assert_eq!(crossings.len(), 1);
    assert_eq!(crossings[0].kind, CrossingKind::Exhausted);
    assert_eq!(crossings[0].resets_at, Some(9_000));

    // Still zero: no duplicate crossing.
    let crossings = tracker.observe(&snapshot(0, Some(9_000)));
    assert!(crossings.is_empty());
}

#[test]
fn reset_at_change_clears_thresholds() {
    let mut tracker = TrackerState::new();
    tracker.observe(&snapshot(0, Some(1_000)));

    // resetsAt advanced: the window rolled over, thresholds clear.
    let crossings = tracker.observe(&snapshot(20, Some(2_000)));
    assert_eq!(crossings.len(), 1);
    assert_eq!(crossings[0].kind, CrossingKind::Warning25);
}

#[test]
fn cooldown_for_exhaustion_uses_max_resets_at() {
    let crossings = vec![
        Crossing { window: "5h".to_owned(), kind: CrossingKind::Exhausted, resets_at: Some(1_000) },
        Crossing { window: "weekly".to_owned(), kind: CrossingKind::Exhausted, resets_at: Some(5_000) },
    ];
    assert_eq!(cooldown_for_exhaustion(&crossings, 0), 5_000);
}

#[test]
fn cooldown_for_exhaustion_falls_back_to_default_window() {
    let crossings =
        vec![Crossing { window: "5h".to_owned(), kind: CrossingKind::Exhausted, resets_at: None }];
    assert_eq!(cooldown_for_exhaustion(&crossings, 10_000), 10_000 + 5 * 60 * 1000);
}
