//! Ledger queries for `EcoBin`: profiles, scan records and points history.

use ecobin_core::db::unix_timestamp;

use super::db::{DatabaseError, RewardsDatabase};
use super::models::{
    DebitOutcome, HistoryAction, HistoryEntry, NewHistoryEntry, PointsDebit, ScanAward,
    ScanClaim, ScanRecord, UserProfile,
};

impl RewardsDatabase {
    // =========================================================================
    // Profile queries
    // =========================================================================

    /// Get a profile by user ID.
    pub async fn get_profile(&self, user_id: &str) -> Result<UserProfile, DatabaseError> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Profile {user_id}")))
    }

    /// Overwrite a profile's balance.
    pub async fn set_profile_points(&self, user_id: &str, points: i64) -> Result<(), DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query("UPDATE profiles SET points = ?, updated_at = ? WHERE id = ?")
            .bind(points)
            .bind(now)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Profile {user_id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Scan record queries
    // =========================================================================

    /// Get the cooldown record for a (user, bin) pair.
    pub async fn get_scan_record(
        &self,
        user_id: &str,
        qr_id: &str,
    ) -> Result<Option<ScanRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, ScanRecord>(
            "SELECT * FROM qr_scans WHERE user_id = ? AND qr_id = ?",
        )
        .bind(user_id)
        .bind(qr_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(record)
    }

    /// Insert or refresh the cooldown record for a (user, bin) pair.
    pub async fn upsert_scan_record(
        &self,
        user_id: &str,
        qr_id: &str,
        scanned_at: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO qr_scans (user_id, qr_id, last_scanned_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, qr_id) DO UPDATE SET last_scanned_at = excluded.last_scanned_at
            ",
        )
        .bind(user_id)
        .bind(qr_id)
        .bind(scanned_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    // =========================================================================
    // History queries
    // =========================================================================

    /// Append a history entry.
    pub async fn insert_history(
        &self,
        entry: &NewHistoryEntry<'_>,
    ) -> Result<HistoryEntry, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "INSERT INTO points_history (user_id, action, points_change, description, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.points_change)
        .bind(entry.description)
        .bind(now)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        sqlx::query_as::<_, HistoryEntry>("SELECT * FROM points_history WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("History entry {id}")))
    }

    /// All history for a user, newest first.
    pub async fn list_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            "SELECT * FROM points_history WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Sum of all balance changes recorded for a user.
    pub async fn history_total(&self, user_id: &str) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(points_change), 0) FROM points_history WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }

    // =========================================================================
    // Transactional ledger procedures
    // =========================================================================

    /// Award a scan: claim the cooldown slot, credit points and append history
    /// in one transaction.
    ///
    /// The cooldown slot is claimed with a conditional upsert, so two sessions
    /// racing on the same (user, bin) pair award at most once per window.
    pub async fn award_scan(&self, claim: &ScanClaim<'_>) -> Result<ScanAward, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        // Write first so the transaction holds the write lock from the start.
        let touched = sqlx::query("UPDATE profiles SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(claim.user_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Profile {}", claim.user_id)));
        }

        let claimed = sqlx::query(
            r"
            INSERT INTO qr_scans (user_id, qr_id, last_scanned_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, qr_id) DO UPDATE SET last_scanned_at = excluded.last_scanned_at
            WHERE qr_scans.last_scanned_at <= ?
            ",
        )
        .bind(claim.user_id)
        .bind(claim.qr_id)
        .bind(claim.now)
        .bind(claim.now - claim.cooldown_secs)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let (last_scanned_at,): (i64,) = sqlx::query_as(
                "SELECT last_scanned_at FROM qr_scans WHERE user_id = ? AND qr_id = ?",
            )
            .bind(claim.user_id)
            .bind(claim.qr_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;
            return Ok(ScanAward::Cooling { last_scanned_at });
        }

        sqlx::query("UPDATE profiles SET points = points + ? WHERE id = ?")
            .bind(claim.reward)
            .bind(claim.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO points_history (user_id, action, points_change, description, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(claim.user_id)
        .bind(HistoryAction::QrScan.as_str())
        .bind(claim.reward)
        .bind(claim.description)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let (new_balance,): (i64,) = sqlx::query_as("SELECT points FROM profiles WHERE id = ?")
            .bind(claim.user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ScanAward::Awarded { new_balance })
    }

    /// Debit points if the balance covers the amount, appending history in the
    /// same transaction.
    pub async fn debit_points(&self, debit: &PointsDebit<'_>) -> Result<DebitOutcome, DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let debited = sqlx::query(
            "UPDATE profiles SET points = points - ?, updated_at = ? WHERE id = ? AND points >= ?",
        )
        .bind(debit.amount)
        .bind(now)
        .bind(debit.user_id)
        .bind(debit.amount)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            let balance: Option<(i64,)> = sqlx::query_as("SELECT points FROM profiles WHERE id = ?")
                .bind(debit.user_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return match balance {
                Some((balance,)) => Ok(DebitOutcome::Insufficient { balance }),
                None => Err(DatabaseError::NotFound(format!("Profile {}", debit.user_id))),
            };
        }

        sqlx::query(
            "INSERT INTO points_history (user_id, action, points_change, description, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(debit.user_id)
        .bind(HistoryAction::CouponRedeem.as_str())
        .bind(-debit.amount)
        .bind(debit.description)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let (new_balance,): (i64,) = sqlx::query_as("SELECT points FROM profiles WHERE id = ?")
            .bind(debit.user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(DebitOutcome::Debited { new_balance })
    }
}
