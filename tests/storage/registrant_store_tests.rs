//! RegistrantStore interface tests.
//!
//! These tests verify the contract of the RegistrantStore trait.
//! Each storage implementation should run these tests.

use uuid::Uuid;

use referral_engine::interfaces::{ConflictField, CreditOutcome, RegistrantStore, StoreError};
use referral_engine::model::NewRegistrant;

/// Create a test candidate with unique identity derived from `tag`.
pub fn make_candidate(tag: &str) -> NewRegistrant {
    let nonce = Uuid::new_v4().simple().to_string();
    NewRegistrant {
        full_name: format!("Test {tag}"),
        email: format!("test_{tag}_{nonce}@example.com"),
        username: format!("test_{tag}_{nonce}"),
        phone: None,
        source: None,
        referral_code: format!("T{}", &nonce[..7].to_uppercase()),
        referred_by_code: None,
    }
}

// =============================================================================
// insert_registrant tests
// =============================================================================

pub async fn test_insert_assigns_identity<S: RegistrantStore>(store: &S) {
    let candidate = make_candidate("identity");
    let email = candidate.email.clone();

    let registrant = store
        .insert_registrant(candidate)
        .await
        .expect("insert should succeed");
    assert_eq!(registrant.email, email);
    assert_eq!(registrant.referral_count, 0);
    assert_eq!(registrant.bonus_units, 1);

    let found = store
        .find_by_email(&email)
        .await
        .expect("find should succeed")
        .expect("registrant should exist");
    assert_eq!(found, registrant);
}

pub async fn test_insert_rejects_duplicate_email<S: RegistrantStore>(store: &S) {
    let first = make_candidate("dup_email");
    store.insert_registrant(first.clone()).await.expect("insert");

    let mut second = make_candidate("dup_email2");
    second.email = first.email.clone();
    match store.insert_registrant(second).await {
        Err(StoreError::UniqueViolation(ConflictField::Email)) => {}
        other => panic!("expected email violation, got {other:?}"),
    }
}

pub async fn test_insert_rejects_duplicate_username<S: RegistrantStore>(store: &S) {
    let first = make_candidate("dup_user");
    store.insert_registrant(first.clone()).await.expect("insert");

    let mut second = make_candidate("dup_user2");
    second.username = first.username.clone();
    match store.insert_registrant(second).await {
        Err(StoreError::UniqueViolation(ConflictField::Username)) => {}
        other => panic!("expected username violation, got {other:?}"),
    }
}

pub async fn test_insert_rejects_duplicate_code<S: RegistrantStore>(store: &S) {
    let first = make_candidate("dup_code");
    store.insert_registrant(first.clone()).await.expect("insert");

    let mut second = make_candidate("dup_code2");
    second.referral_code = first.referral_code.clone();
    match store.insert_registrant(second).await {
        Err(StoreError::UniqueViolation(ConflictField::ReferralCode)) => {}
        other => panic!("expected code violation, got {other:?}"),
    }
}

// =============================================================================
// lookup tests
// =============================================================================

pub async fn test_find_by_code_misses_return_none<S: RegistrantStore>(store: &S) {
    let found = store
        .find_by_referral_code("NO-SUCH-CODE")
        .await
        .expect("lookup should succeed");
    assert!(found.is_none());
}

// =============================================================================
// credit tests
// =============================================================================

pub async fn test_increment_recomputes_bonus<S: RegistrantStore>(store: &S) {
    let registrant = store
        .insert_registrant(make_candidate("increment"))
        .await
        .expect("insert");

    for expected in 1..=3i64 {
        store
            .increment_referral_credit(registrant.id)
            .await
            .expect("increment");
        let after = store
            .find_by_referral_code(&registrant.referral_code)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(after.referral_count, expected);
        assert_eq!(after.bonus_units, 1 + expected);
    }
}

pub async fn test_increment_unknown_id_is_not_found<S: RegistrantStore>(store: &S) {
    match store.increment_referral_credit(Uuid::new_v4()).await {
        Err(StoreError::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

pub async fn test_edge_unique_per_referred<S: RegistrantStore>(store: &S) {
    let referrer = store.insert_registrant(make_candidate("edge_a")).await.expect("insert");
    let other = store.insert_registrant(make_candidate("edge_b")).await.expect("insert");
    let referred = store.insert_registrant(make_candidate("edge_c")).await.expect("insert");

    store
        .insert_referral_edge(referrer.id, referred.id, &referrer.referral_code)
        .await
        .expect("first edge");
    match store
        .insert_referral_edge(other.id, referred.id, &other.referral_code)
        .await
    {
        Err(StoreError::EdgeExists) => {}
        other => panic!("expected EdgeExists, got {other:?}"),
    }
}

pub async fn test_credit_referral_is_idempotent<S: RegistrantStore>(store: &S) {
    let referrer = store.insert_registrant(make_candidate("credit_a")).await.expect("insert");
    let referred = store.insert_registrant(make_candidate("credit_b")).await.expect("insert");

    let first = store
        .credit_referral(referrer.id, referred.id, &referrer.referral_code)
        .await
        .expect("credit");
    assert_eq!(first, CreditOutcome::Credited);

    let retry = store
        .credit_referral(referrer.id, referred.id, &referrer.referral_code)
        .await
        .expect("retry");
    assert_eq!(retry, CreditOutcome::AlreadyAttributed);

    let after = store
        .find_by_referral_code(&referrer.referral_code)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(after.referral_count, 1);
    assert_eq!(after.bonus_units, 2);
}

pub async fn test_credit_unknown_referrer_rolls_back<S: RegistrantStore>(store: &S) {
    let referred = store.insert_registrant(make_candidate("rollback")).await.expect("insert");
    let edges_before = store.count_edges().await.expect("count");

    match store
        .credit_referral(Uuid::new_v4(), referred.id, "GHOST1")
        .await
    {
        Err(StoreError::NotFound { .. }) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }

    // The edge write must have rolled back with the failed increment.
    let edges_after = store.count_edges().await.expect("count");
    assert_eq!(edges_after, edges_before);
}

// =============================================================================
// read-path tests
// =============================================================================

pub async fn test_referrals_listed_newest_first<S: RegistrantStore>(store: &S) {
    let referrer = store.insert_registrant(make_candidate("list_a")).await.expect("insert");
    let mut referred_usernames = Vec::new();

    for tag in ["list_b", "list_c"] {
        let referred = store.insert_registrant(make_candidate(tag)).await.expect("insert");
        store
            .credit_referral(referrer.id, referred.id, &referrer.referral_code)
            .await
            .expect("credit");
        referred_usernames.push(referred.username.clone());
        // Distinct edge timestamps for a deterministic newest-first order.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let referrals = store.referrals_of(referrer.id).await.expect("referrals");
    let usernames: Vec<&str> = referrals.iter().map(|r| r.username.as_str()).collect();
    referred_usernames.reverse();
    assert_eq!(usernames, referred_usernames);
}

pub async fn test_ranked_ordering_is_deterministic<S: RegistrantStore>(store: &S) {
    let mut ids = Vec::new();
    for tag in ["rank_a", "rank_b", "rank_c"] {
        let registrant = store.insert_registrant(make_candidate(tag)).await.expect("insert");
        ids.push(registrant.id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    // Counts: a=1, b=1, c=2. Expected order: c, then a before b (earlier
    // created_at wins the tie).
    store.increment_referral_credit(ids[0]).await.expect("credit");
    store.increment_referral_credit(ids[1]).await.expect("credit");
    store.increment_referral_credit(ids[2]).await.expect("credit");
    store.increment_referral_credit(ids[2]).await.expect("credit");

    let ranked = store.list_ranked(None).await.expect("list");
    let positions: Vec<usize> = ids
        .iter()
        .map(|id| ranked.iter().position(|r| r.id == *id).expect("ranked"))
        .collect();
    assert!(positions[2] < positions[0], "c should outrank a");
    assert!(positions[0] < positions[1], "a should outrank b on created_at");
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all RegistrantStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_registrant_store_tests {
    ($store:expr) => {
        use $crate::storage::registrant_store_tests::*;

        test_insert_assigns_identity($store).await;
        println!("  test_insert_assigns_identity: PASSED");

        test_insert_rejects_duplicate_email($store).await;
        println!("  test_insert_rejects_duplicate_email: PASSED");

        test_insert_rejects_duplicate_username($store).await;
        println!("  test_insert_rejects_duplicate_username: PASSED");

        test_insert_rejects_duplicate_code($store).await;
        println!("  test_insert_rejects_duplicate_code: PASSED");

        test_find_by_code_misses_return_none($store).await;
        println!("  test_find_by_code_misses_return_none: PASSED");

        test_increment_recomputes_bonus($store).await;
        println!("  test_increment_recomputes_bonus: PASSED");

        test_increment_unknown_id_is_not_found($store).await;
        println!("  test_increment_unknown_id_is_not_found: PASSED");

        test_edge_unique_per_referred($store).await;
        println!("  test_edge_unique_per_referred: PASSED");

        test_credit_referral_is_idempotent($store).await;
        println!("  test_credit_referral_is_idempotent: PASSED");

        test_credit_unknown_referrer_rolls_back($store).await;
        println!("  test_credit_unknown_referrer_rolls_back: PASSED");

        test_referrals_listed_newest_first($store).await;
        println!("  test_referrals_listed_newest_first: PASSED");

        test_ranked_ordering_is_deterministic($store).await;
        println!("  test_ranked_ordering_is_deterministic: PASSED");
    };
}
