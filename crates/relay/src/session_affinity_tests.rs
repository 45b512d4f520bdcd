use super::*;

fn store() -> (tempfile::TempDir, SessionAffinityStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session-affinity.json");
    let kv = Arc::new(KvStore::new());
    (dir, SessionAffinityStore::new(kv, path))
}

#[tokio::test]
async fn record_and_read_sticky_mapping() {
    let (_dir, store) = store();
    store.record_sticky("native", "ses_1", "acct_a").await;
    assert_eq!(store.sticky_for("native", "ses_1").await.as_deref(), Some("acct_a"));
    assert_eq!(store.sticky_for("native", "ses_2").await, None);
}

#[tokio::test]
async fn record_and_clear_hybrid_mapping() {
    let (_dir, store) = store();
    store.record_hybrid("native", "ses_1", "acct_b").await;
    assert_eq!(store.hybrid_for("native", "ses_1").await.as_deref(), Some("acct_b"));

    store.clear_hybrid("native", "ses_1").await;
    assert_eq!(store.hybrid_for("native", "ses_1").await, None);
}

#[tokio::test]
async fn observe_session_persists_across_store_instances() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session-affinity.json");
    let kv = Arc::new(KvStore::new());

    {
        let store = SessionAffinityStore::new(Arc::clone(&kv), path.clone());
        store.observe_session("native", "ses_1", 1_000).await;
        store.record_sticky("native", "ses_1", "acct_a").await;
    }

    let reopened = SessionAffinityStore::new(kv, path);
    assert_eq!(reopened.sticky_for("native", "ses_1").await.as_deref(), Some("acct_a"));
}

#[tokio::test]
async fn prune_drops_entries_older_than_ttl() {
    let (_dir, store) = store();
    store.observe_session("native", "ses_old", 0).await;
    store.record_sticky("native", "ses_old", "acct_a").await;

    // Beyond the 6h TTL.
    store.observe_session("native", "ses_new", DEFAULT_TTL_MS + 1).await;

    assert_eq!(store.sticky_for("native", "ses_old").await, None);
    assert!(store.state.read().await.modes.get("native").unwrap().seen_session_keys.contains_key("ses_new"));
}

#[tokio::test]
async fn mark_session_missing_past_grace_period_removes_mappings() {
    let (_dir, store) = store();
    store.observe_session("native", "ses_1", 0).await;
    store.record_sticky("native", "ses_1", "acct_a").await;

    // Within grace period: not yet removed.
    store.mark_session_missing("native", "ses_1", 1_000).await;
    assert_eq!(store.sticky_for("native", "ses_1").await.as_deref(), Some("acct_a"));

    // Past grace period: removed.
    store.mark_session_missing("native", "ses_1", DEFAULT_MISSING_GRACE_MS + 1).await;
    assert_eq!(store.sticky_for("native", "ses_1").await, None);
}

#[tokio::test]
async fn size_bound_evicts_oldest_first() {
    let (_dir, store) = store();
    for i in 0..(DEFAULT_MAX_SIZE + 5) {
        store.observe_session("native", &format!("ses_{i}"), i as u64).await;
    }
    let state = store.state.read().await;
    let mode = state.modes.get("native").unwrap();
    assert_eq!(mode.seen_session_keys.len(), DEFAULT_MAX_SIZE);
    assert!(!mode.seen_session_keys.contains_key("ses_0"));
}
