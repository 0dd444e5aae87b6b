#![allow(clippy::unwrap_used, clippy::panic)] // Integration tests use unwrap for brevity

//! End-to-end tests against a file-backed database.
//!
//! Covers the full flow from registration through the session to the
//! ledger, and cross-session races that only a real connection pool can
//! produce.

use std::sync::Arc;

use ecobin_core::config::AuthConfig;
use ecobin_ledger::auth::{AuthError, IdentityService, JwtManager};
use ecobin_ledger::catalog::Catalog;
use ecobin_ledger::ledger::{Ledger, LedgerError, LedgerRules};
use ecobin_ledger::session::{Notice, Session};
use ecobin_ledger::storage::RewardsDatabase;

const BIN: &str = "https://qrco.de/bgBWbc";
const T0: i64 = 1_700_000_000;

async fn open_db(dir: &tempfile::TempDir) -> RewardsDatabase {
    RewardsDatabase::open(&dir.path().join("ecobin.db"))
        .await
        .unwrap()
}

async fn identity_with_alice(
    dir: &tempfile::TempDir,
) -> (Arc<IdentityService>, ecobin_ledger::auth::AuthTokens) {
    let identity = IdentityService::new(
        open_db(dir).await,
        JwtManager::new(b"integration-secret", 3600, 86400),
        AuthConfig::default(),
    );
    let tokens = identity
        .register("alice", "alice@example.com", "secret1")
        .await
        .unwrap();
    (Arc::new(identity), tokens)
}

/// Spawn `n` copies of `op` and count how many succeeded. Every failure
/// must be `InvalidToken`.
async fn count_successes<F, Fut, T>(n: usize, op: F) -> usize
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, AuthError>> + Send + 'static,
    T: Send + 'static,
{
    let tasks: Vec<_> = (0..n).map(|_| tokio::spawn(op())).collect();
    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AuthError::InvalidToken) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    ok
}

/// Ledger with `scans` accepted scans already recorded for a new user.
async fn funded_ledger(
    dir: &tempfile::TempDir,
    scans: i64,
) -> (Arc<Ledger<RewardsDatabase>>, String) {
    let db = open_db(dir).await;
    let identity = IdentityService::new(
        db.clone(),
        JwtManager::new(b"integration-secret", 3600, 86400),
        AuthConfig::default(),
    );
    let tokens = identity
        .register("alice", "alice@example.com", "secret1")
        .await
        .unwrap();

    let ledger = Arc::new(Ledger::new(db, LedgerRules::default(), Catalog::default()));
    for i in 0..scans {
        ledger
            .record_scan(&tokens.user_id, BIN, T0 + i * 300)
            .await
            .unwrap();
    }
    (ledger, tokens.user_id)
}

#[tokio::test]
async fn registration_to_redemption() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    let identity = IdentityService::new(
        db.clone(),
        JwtManager::new(b"integration-secret", 3600, 86400),
        AuthConfig::default(),
    );
    let ledger = Arc::new(Ledger::new(
        db.clone(),
        LedgerRules::default(),
        Catalog::default(),
    ));
    let mut session = Session::new(Arc::clone(&ledger));
    let mut events = identity.subscribe();

    identity
        .register("alice", "alice@example.com", "secret1")
        .await
        .unwrap();
    session
        .handle_auth_event(&events.recv().await.unwrap())
        .await
        .unwrap();
    assert_eq!(session.profile().unwrap().points, 0);

    let receipt = session.record_scan(BIN).await.unwrap();
    assert_eq!(
        Notice::scan_awarded(&receipt).message,
        "+10 points added!"
    );

    let err = session.record_scan(BIN).await.unwrap_err();
    assert_eq!(
        Notice::scan_failed(&err).message,
        "Please wait 5 more minute(s) to scan again."
    );

    let err = session.redeem("coupon1").await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientPoints {
            balance: 10,
            required: 100
        }
    ));

    let user_id = session.user_id().unwrap().to_string();
    let record = db.get_scan_record(&user_id, BIN).await.unwrap().unwrap();
    assert!(record.last_scanned_at > T0);
    assert_eq!(db.list_history(&user_id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_never_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, user_id) = funded_ledger(&dir, 12).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let ledger = Arc::clone(&ledger);
        let user_id = user_id.clone();
        tasks.push(tokio::spawn(async move {
            ledger.redeem_coupon(&user_id, "coupon6").await
        }));
    }

    let mut redeemed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => redeemed += 1,
            Err(LedgerError::InsufficientPoints { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    // 120 points buy exactly four 30-point coupons.
    assert_eq!(redeemed, 4);
    let profile = ledger.store().get_profile(&user_id).await.unwrap();
    assert_eq!(profile.points, 0);
    assert_eq!(
        ledger.store().history_total(&user_id).await.unwrap(),
        profile.points
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_award_once() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, user_id) = funded_ledger(&dir, 0).await;

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let ledger = Arc::clone(&ledger);
        let user_id = user_id.clone();
        tasks.push(tokio::spawn(async move {
            ledger.record_scan(&user_id, BIN, T0).await
        }));
    }

    let mut awarded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => awarded += 1,
            Err(LedgerError::CooldownActive { remaining_minutes }) => {
                assert_eq!(remaining_minutes, 5);
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(awarded, 1);
    assert_eq!(
        ledger.store().get_profile(&user_id).await.unwrap().points,
        10
    );
    assert_eq!(ledger.store().list_history(&user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let user_id = {
        let (_ledger, user_id) = funded_ledger(&dir, 2).await;
        user_id
    };

    let db = open_db(&dir).await;
    let ledger = Ledger::new(db, LedgerRules::default(), Catalog::default());
    let stats = ledger.dashboard_stats(&user_id).await.unwrap();
    assert_eq!(stats.points, 20);
    assert_eq!(stats.total_scans, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_rotate_once() {
    let dir = tempfile::tempdir().unwrap();
    let (identity, tokens) = identity_with_alice(&dir).await;

    let refreshed = count_successes(8, || {
        let identity = Arc::clone(&identity);
        let token = tokens.refresh_token.clone();
        async move { identity.refresh(&token).await }
    })
    .await;

    assert_eq!(refreshed, 1);
    assert!(matches!(
        identity.refresh(&tokens.refresh_token).await,
        Err(AuthError::InvalidToken)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recovery_token_is_spent_once() {
    let dir = tempfile::tempdir().unwrap();
    let (identity, _) = identity_with_alice(&dir).await;
    let recovery = identity
        .request_password_reset("alice@example.com")
        .await
        .unwrap()
        .unwrap();

    let resets = count_successes(6, || {
        let identity = Arc::clone(&identity);
        let token = recovery.clone();
        async move { identity.reset_password(&token, "new-secret").await }
    })
    .await;

    assert_eq!(resets, 1);
    identity.sign_in("alice", "new-secret").await.unwrap();
}
