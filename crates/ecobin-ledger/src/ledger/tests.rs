#![allow(clippy::unwrap_used)]

use async_trait::async_trait;

use super::*;
use crate::storage::{
    DatabaseError, NewAccount, NewHistoryEntry, RewardsDatabase, ScanRecord, UserProfile,
};

const BIN: &str = "https://qrco.de/bgBWbc";
const T0: i64 = 1_700_000_000;

async fn ledger() -> Ledger<RewardsDatabase> {
    let db = RewardsDatabase::open_in_memory().await.unwrap();
    db.create_account(&NewAccount {
        id: "u1",
        username: "alice",
        email: "alice@example.com",
        password_hash: "hash",
    })
    .await
    .unwrap();
    Ledger::new(db, LedgerRules::default(), Catalog::default())
}

async fn balance(ledger: &Ledger<RewardsDatabase>) -> i64 {
    ledger.store().get_profile("u1").await.unwrap().points
}

/// Scans `n` times, each one cooldown apart, starting at `T0`.
async fn scan_n(ledger: &Ledger<RewardsDatabase>, n: i64) {
    for i in 0..n {
        ledger.record_scan("u1", BIN, T0 + i * 300).await.unwrap();
    }
}

#[tokio::test]
async fn first_scan_awards_reward() {
    let ledger = ledger().await;
    let receipt = ledger.record_scan("u1", BIN, T0).await.unwrap();
    assert_eq!(
        receipt,
        ScanReceipt {
            points_awarded: 10,
            new_balance: 10
        }
    );
    let record = ledger
        .store()
        .get_scan_record("u1", BIN)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.last_scanned_at, T0);
}

#[tokio::test]
async fn wrong_code_changes_nothing() {
    let ledger = ledger().await;
    let err = ledger
        .record_scan("u1", "https://example.com/other", T0)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidCode));

    assert_eq!(balance(&ledger).await, 0);
    assert!(
        ledger
            .store()
            .get_scan_record("u1", "https://example.com/other")
            .await
            .unwrap()
            .is_none()
    );
    assert!(ledger.store().list_history("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn cooldown_boundary() {
    let ledger = ledger().await;
    ledger.record_scan("u1", BIN, T0).await.unwrap();

    let err = ledger
        .record_scan("u1", BIN, T0 + 4 * 60 + 59)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::CooldownActive {
            remaining_minutes: 1
        }
    ));
    assert_eq!(balance(&ledger).await, 10);

    let receipt = ledger.record_scan("u1", BIN, T0 + 5 * 60).await.unwrap();
    assert_eq!(receipt.new_balance, 20);
}

#[tokio::test]
async fn redeem_below_cost_is_insufficient() {
    let ledger = ledger().await;
    scan_n(&ledger, 4).await;

    let err = ledger.redeem_coupon("u1", "coupon2").await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientPoints {
            balance: 40,
            required: 50
        }
    ));
    assert_eq!(balance(&ledger).await, 40);
}

#[tokio::test]
async fn redeem_exact_balance_leaves_zero() {
    let ledger = ledger().await;
    scan_n(&ledger, 3).await;

    let redemption = ledger.redeem_coupon("u1", "coupon6").await.unwrap();
    assert_eq!(redemption.new_balance, 0);
    assert_eq!(redemption.coupon.name, "Free Eco-Bag");

    let history = ledger.store().list_history("u1").await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].points_change, -30);
    assert_eq!(history[0].description, "Redeemed: Free Eco-Bag");
}

#[tokio::test]
async fn unknown_coupon_is_rejected() {
    let ledger = ledger().await;
    let err = ledger.redeem_coupon("u1", "coupon99").await.unwrap_err();
    assert!(matches!(err, LedgerError::UnknownCoupon(id) if id == "coupon99"));
}

#[tokio::test]
async fn balance_equals_history_sum() {
    let ledger = ledger().await;
    scan_n(&ledger, 12).await;
    ledger.redeem_coupon("u1", "coupon2").await.unwrap();
    ledger.redeem_coupon("u1", "coupon6").await.unwrap();
    // Rejected operations must not disturb the invariant.
    let _ = ledger.redeem_coupon("u1", "coupon3").await;
    let _ = ledger.record_scan("u1", BIN, T0 + 11 * 300 + 1).await;

    let total = ledger.store().history_total("u1").await.unwrap();
    assert_eq!(balance(&ledger).await, total);
    assert_eq!(total, 12 * 10 - 50 - 30);
}

#[tokio::test]
async fn dashboard_on_empty_history() {
    let ledger = ledger().await;
    let stats = ledger.dashboard_stats("u1").await.unwrap();
    assert_eq!(
        stats,
        DashboardStats {
            points: 0,
            total_scans: 0,
            total_redeemed: 0,
            recent_history: Vec::new(),
            full_history: Vec::new(),
        }
    );
}

#[tokio::test]
async fn dashboard_counts_by_action_and_limits_recent() {
    let ledger = ledger().await;
    scan_n(&ledger, 7).await;
    ledger.redeem_coupon("u1", "coupon6").await.unwrap();

    let stats = ledger.dashboard_stats("u1").await.unwrap();
    assert_eq!(stats.points, 40);
    assert_eq!(stats.total_scans, 7);
    assert_eq!(stats.total_redeemed, 1);
    assert_eq!(stats.full_history.len(), 8);
    assert_eq!(stats.recent_history.len(), RECENT_ACTIVITY_LIMIT);
    assert_eq!(stats.recent_history[0].kind(), Some(HistoryAction::CouponRedeem));
}

#[tokio::test]
async fn failed_history_append_rolls_back_scan() {
    let ledger = ledger().await;
    sqlx::query("DROP TABLE points_history")
        .execute(ledger.store().pool())
        .await
        .unwrap();

    let err = ledger.record_scan("u1", BIN, T0).await.unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));

    assert_eq!(balance(&ledger).await, 0);
    assert!(
        ledger
            .store()
            .get_scan_record("u1", BIN)
            .await
            .unwrap()
            .is_none()
    );
}

/// Store whose reads succeed but whose transactional procedures fail.
struct ReadOnlyStore(RewardsDatabase);

#[async_trait]
impl RewardsStore for ReadOnlyStore {
    async fn read_profile(&self, user_id: &str) -> Result<UserProfile, DatabaseError> {
        self.0.read_profile(user_id).await
    }

    async fn write_profile_points(&self, _: &str, _: i64) -> Result<(), DatabaseError> {
        Err(DatabaseError::Query("read-only".into()))
    }

    async fn read_scan_record(
        &self,
        user_id: &str,
        qr_id: &str,
    ) -> Result<Option<ScanRecord>, DatabaseError> {
        self.0.read_scan_record(user_id, qr_id).await
    }

    async fn upsert_scan_record(&self, _: &str, _: &str, _: i64) -> Result<(), DatabaseError> {
        Err(DatabaseError::Query("read-only".into()))
    }

    async fn append_history(
        &self,
        _: &NewHistoryEntry<'_>,
    ) -> Result<HistoryEntry, DatabaseError> {
        Err(DatabaseError::Query("read-only".into()))
    }

    async fn read_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError> {
        self.0.read_history(user_id).await
    }

    async fn award_scan(&self, _: &ScanClaim<'_>) -> Result<ScanAward, DatabaseError> {
        Err(DatabaseError::Query("read-only".into()))
    }

    async fn debit_points(&self, _: &PointsDebit<'_>) -> Result<DebitOutcome, DatabaseError> {
        Err(DatabaseError::Query("read-only".into()))
    }
}

#[tokio::test]
async fn store_failures_surface_as_storage_errors() {
    let inner = ledger().await;
    let ledger = Ledger::new(
        ReadOnlyStore(inner.store().clone()),
        LedgerRules::default(),
        Catalog::default(),
    );

    assert!(matches!(
        ledger.record_scan("u1", BIN, T0).await,
        Err(LedgerError::Storage(_))
    ));
    assert!(matches!(
        ledger.redeem_coupon("u1", "coupon6").await,
        Err(LedgerError::Storage(_))
    ));
    // Reads still work.
    assert_eq!(ledger.dashboard_stats("u1").await.unwrap().points, 0);
}

#[tokio::test]
async fn custom_rules_are_honoured() {
    let db = RewardsDatabase::open_in_memory().await.unwrap();
    db.create_account(&NewAccount {
        id: "u1",
        username: "alice",
        email: "alice@example.com",
        password_hash: "hash",
    })
    .await
    .unwrap();
    let rules = LedgerRules {
        bin_code: "bin-7".into(),
        scan_reward: 25,
        cooldown_secs: 60,
    };
    let ledger = Ledger::new(db, rules, Catalog::default());

    assert!(matches!(
        ledger.record_scan("u1", BIN, T0).await,
        Err(LedgerError::InvalidCode)
    ));
    assert_eq!(ledger.record_scan("u1", "bin-7", T0).await.unwrap().new_balance, 25);
    assert_eq!(
        ledger.record_scan("u1", "bin-7", T0 + 60).await.unwrap().new_balance,
        50
    );
}
