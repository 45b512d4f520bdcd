use super::*;

fn account(identity_key: &str) -> Account {
    Account {
        identity_key: identity_key.to_owned(),
        auth_mode: AuthMode::Native,
        account_id: Some("acct".to_owned()),
        email: Some("user@example.com".to_owned()),
        plan: Some("pro".to_owned()),
        access: "access-token".to_owned(),
        refresh: Some("refresh-token".to_owned()),
        expires: 1_000,
        enabled: true,
        cooldown_until: None,
        refresh_lease_until: None,
        last_used: None,
        auth_types: None,
    }
}

fn store() -> (tempfile::TempDir, AccountStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("auth.json");
    let kv = Arc::new(KvStore::new());
    let store = AccountStore::new(kv, path, "openai");
    (dir, store)
}

#[tokio::test]
async fn ensure_domain_creates_empty_provider_domain() {
    let (_dir, store) = store();
    store.ensure_domain().await.expect("ensure_domain");
    assert!(store.list(AuthMode::Native).is_empty());
}

#[tokio::test]
async fn upsert_then_list_filters_by_auth_type_default_native() {
    let (_dir, store) = store();
    store.upsert_account(account("a1")).await.expect("upsert");

    assert_eq!(store.list(AuthMode::Native).len(), 1);
    assert!(store.list(AuthMode::Codex).is_empty());
}

#[tokio::test]
async fn list_respects_explicit_auth_types() {
    let (_dir, store) = store();
    let mut acct = account("a1");
    acct.auth_types = Some(vec![AuthMode::Codex]);
    store.upsert_account(acct).await.expect("upsert");

    assert!(store.list(AuthMode::Native).is_empty());
    assert_eq!(store.list(AuthMode::Codex).len(), 1);
}

#[tokio::test]
async fn update_account_patches_in_place() {
    let (_dir, store) = store();
    store.upsert_account(account("a1")).await.expect("upsert");
    store.update_account("a1", |a| a.enabled = false).await.expect("update");

    let accounts = store.list(AuthMode::Native);
    assert_eq!(accounts.len(), 1);
    assert!(!accounts[0].enabled);
}

#[tokio::test]
async fn update_account_on_unknown_identity_is_noop() {
    let (_dir, store) = store();
    store.upsert_account(account("a1")).await.expect("upsert");
    store.update_account("missing", |a| a.enabled = false).await.expect("update");

    assert!(store.list(AuthMode::Native)[0].enabled);
}

#[tokio::test]
async fn set_cooldown_sets_absolute_timestamp() {
    let (_dir, store) = store();
    store.upsert_account(account("a1")).await.expect("upsert");
    store.set_cooldown("a1", 5_000).await.expect("set_cooldown");

    let accounts = store.list(AuthMode::Native);
    assert_eq!(accounts[0].cooldown_until, Some(5_000));
}

#[tokio::test]
async fn mark_used_sets_last_used() {
    let (_dir, store) = store();
    store.upsert_account(account("a1")).await.expect("upsert");
    store.mark_used("a1", 42_000).await.expect("mark_used");

    let accounts = store.list(AuthMode::Native);
    assert_eq!(accounts[0].last_used, Some(42_000));
}

#[tokio::test]
async fn delete_account_removes_it() {
    let (_dir, store) = store();
    store.upsert_account(account("a1")).await.expect("upsert");
    store.delete_account("a1").await.expect("delete");

    assert!(store.list(AuthMode::Native).is_empty());
}

#[tokio::test]
async fn try_acquire_lease_is_exclusive_until_cleared() {
    let (_dir, store) = store();
    store.upsert_account(account("a1")).await.expect("upsert");

    let acquired = store.try_acquire_lease("a1", 1_000, 5_000).await.expect("acquire");
    assert!(acquired.is_some());
    assert_eq!(acquired.unwrap().refresh_lease_until, Some(6_000));

    // Still within the lease window: a second caller is refused.
    let refused = store.try_acquire_lease("a1", 2_000, 5_000).await.expect("acquire");
    assert!(refused.is_none());

    // Lease clears (e.g. refresh completed); a new caller may acquire it.
    store.update_account("a1", |a| a.refresh_lease_until = None).await.expect("clear lease");
    let reacquired = store.try_acquire_lease("a1", 7_000, 5_000).await.expect("acquire");
    assert!(reacquired.is_some());
}

#[test]
fn account_eligibility_accounts_for_cooldown_and_lease() {
    let mut acct = account("a1");
    assert!(acct.is_eligible(100));

    acct.cooldown_until = Some(200);
    assert!(!acct.is_eligible(100));
    assert!(acct.is_eligible(300));

    acct.cooldown_until = None;
    acct.refresh_lease_until = Some(200);
    assert!(!acct.is_eligible(100));
    assert!(acct.is_eligible(300));

    acct.enabled = false;
    acct.refresh_lease_until = None;
    assert!(!acct.is_eligible(300));
}
