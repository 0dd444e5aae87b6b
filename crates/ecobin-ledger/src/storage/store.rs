//! The storage seam the ledger is written against.

use async_trait::async_trait;

use super::db::{DatabaseError, RewardsDatabase};
use super::models::{
    DebitOutcome, HistoryEntry, NewHistoryEntry, PointsDebit, ScanAward, ScanClaim, ScanRecord,
    UserProfile,
};

/// Durable store for profiles, scan cooldowns and points history.
///
/// The primitive reads and writes mirror the hosted backend's tables. Balance
/// changes made by the ledger go through [`award_scan`](Self::award_scan) and
/// [`debit_points`](Self::debit_points), which must apply all of their
/// effects atomically.
#[async_trait]
pub trait RewardsStore: Send + Sync {
    async fn read_profile(&self, user_id: &str) -> Result<UserProfile, DatabaseError>;

    async fn write_profile_points(&self, user_id: &str, points: i64) -> Result<(), DatabaseError>;

    async fn read_scan_record(
        &self,
        user_id: &str,
        qr_id: &str,
    ) -> Result<Option<ScanRecord>, DatabaseError>;

    async fn upsert_scan_record(
        &self,
        user_id: &str,
        qr_id: &str,
        scanned_at: i64,
    ) -> Result<(), DatabaseError>;

    async fn append_history(
        &self,
        entry: &NewHistoryEntry<'_>,
    ) -> Result<HistoryEntry, DatabaseError>;

    /// History for a user, newest first.
    async fn read_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError>;

    async fn award_scan(&self, claim: &ScanClaim<'_>) -> Result<ScanAward, DatabaseError>;

    async fn debit_points(&self, debit: &PointsDebit<'_>) -> Result<DebitOutcome, DatabaseError>;
}

#[async_trait]
impl RewardsStore for RewardsDatabase {
    async fn read_profile(&self, user_id: &str) -> Result<UserProfile, DatabaseError> {
        self.get_profile(user_id).await
    }

    async fn write_profile_points(&self, user_id: &str, points: i64) -> Result<(), DatabaseError> {
        self.set_profile_points(user_id, points).await
    }

    async fn read_scan_record(
        &self,
        user_id: &str,
        qr_id: &str,
    ) -> Result<Option<ScanRecord>, DatabaseError> {
        self.get_scan_record(user_id, qr_id).await
    }

    async fn upsert_scan_record(
        &self,
        user_id: &str,
        qr_id: &str,
        scanned_at: i64,
    ) -> Result<(), DatabaseError> {
        Self::upsert_scan_record(self, user_id, qr_id, scanned_at).await
    }

    async fn append_history(
        &self,
        entry: &NewHistoryEntry<'_>,
    ) -> Result<HistoryEntry, DatabaseError> {
        self.insert_history(entry).await
    }

    async fn read_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError> {
        self.list_history(user_id).await
    }

    async fn award_scan(&self, claim: &ScanClaim<'_>) -> Result<ScanAward, DatabaseError> {
        Self::award_scan(self, claim).await
    }

    async fn debit_points(&self, debit: &PointsDebit<'_>) -> Result<DebitOutcome, DatabaseError> {
        Self::debit_points(self, debit).await
    }
}
