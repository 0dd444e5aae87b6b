//! Rewards ledger: scan awards, coupon redemption and dashboard stats.
//!
//! Every balance change goes through one of the store's transactional
//! procedures and is mirrored by exactly one history entry, so a user's
//! balance always equals the sum of their history.

pub mod cooldown;
mod error;
mod metrics;

#[cfg(test)]
mod tests;

use serde::Serialize;
use tracing::{debug, info, instrument};

use ecobin_core::config::LedgerConfig;

use crate::catalog::{Catalog, Coupon};
use crate::storage::{
    DebitOutcome, HistoryAction, HistoryEntry, PointsDebit, RewardsStore, ScanAward, ScanClaim,
};

pub use cooldown::CooldownState;
pub use error::LedgerError;

/// History description for an awarded scan.
pub const SCAN_DESCRIPTION: &str = "Scanned Dust Bin QR";

/// Number of entries shown as recent activity.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Award rules for a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRules {
    /// Decoded QR text of the bin; also the cooldown key.
    pub bin_code: String,
    pub scan_reward: i64,
    pub cooldown_secs: i64,
}

impl From<&LedgerConfig> for LedgerRules {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            bin_code: config.bin_code.clone(),
            scan_reward: config.scan_reward,
            cooldown_secs: config.cooldown_secs,
        }
    }
}

impl Default for LedgerRules {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanReceipt {
    pub points_awarded: i64,
    pub new_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redemption {
    pub coupon: Coupon,
    pub new_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub points: i64,
    pub total_scans: usize,
    pub total_redeemed: usize,
    pub recent_history: Vec<HistoryEntry>,
    pub full_history: Vec<HistoryEntry>,
}

pub struct Ledger<S> {
    store: S,
    rules: LedgerRules,
    catalog: Catalog,
}

impl<S: RewardsStore> Ledger<S> {
    pub const fn new(store: S, rules: LedgerRules, catalog: Catalog) -> Self {
        Self {
            store,
            rules,
            catalog,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn rules(&self) -> &LedgerRules {
        &self.rules
    }

    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Award points for a decoded bin QR code, subject to the cooldown.
    #[instrument(skip(self, decoded_text))]
    pub async fn record_scan(
        &self,
        user_id: &str,
        decoded_text: &str,
        now: i64,
    ) -> Result<ScanReceipt, LedgerError> {
        if decoded_text != self.rules.bin_code {
            debug!(user_id, "Rejected scan of unexpected code");
            metrics::scan_rejected("invalid_code");
            return Err(LedgerError::InvalidCode);
        }

        let record = self.store.read_scan_record(user_id, decoded_text).await?;
        if let Err(remaining_minutes) =
            CooldownState::from_record(record.as_ref()).check(now, self.rules.cooldown_secs)
        {
            debug!(user_id, remaining_minutes, "Scan rejected by cooldown");
            metrics::scan_rejected("cooldown");
            return Err(LedgerError::CooldownActive { remaining_minutes });
        }

        let award = self
            .store
            .award_scan(&ScanClaim {
                user_id,
                qr_id: decoded_text,
                now,
                reward: self.rules.scan_reward,
                cooldown_secs: self.rules.cooldown_secs,
                description: SCAN_DESCRIPTION,
            })
            .await?;

        match award {
            ScanAward::Awarded { new_balance } => {
                info!(user_id, new_balance, "Scan awarded");
                metrics::scan_accepted();
                Ok(ScanReceipt {
                    points_awarded: self.rules.scan_reward,
                    new_balance,
                })
            }
            ScanAward::Cooling { last_scanned_at } => {
                // Another session claimed the window between our read and write.
                let remaining_minutes = CooldownState::Cooling { last_scanned_at }
                    .check(now, self.rules.cooldown_secs)
                    .err()
                    .unwrap_or(1);
                debug!(user_id, remaining_minutes, "Scan lost cooldown race");
                metrics::scan_rejected("cooldown");
                Err(LedgerError::CooldownActive { remaining_minutes })
            }
        }
    }

    /// Spend points on a catalog coupon.
    #[instrument(skip(self))]
    pub async fn redeem_coupon(
        &self,
        user_id: &str,
        coupon_id: &str,
    ) -> Result<Redemption, LedgerError> {
        let coupon = self
            .catalog
            .find(coupon_id)
            .ok_or_else(|| LedgerError::UnknownCoupon(coupon_id.to_string()))?;

        let description = format!("Redeemed: {}", coupon.name);
        let outcome = self
            .store
            .debit_points(&PointsDebit {
                user_id,
                amount: coupon.points,
                description: &description,
            })
            .await?;

        match outcome {
            DebitOutcome::Debited { new_balance } => {
                info!(user_id, coupon_id, new_balance, "Coupon redeemed");
                metrics::redemption(coupon_id);
                Ok(Redemption {
                    coupon: coupon.clone(),
                    new_balance,
                })
            }
            DebitOutcome::Insufficient { balance } => Err(LedgerError::InsufficientPoints {
                balance,
                required: coupon.points,
            }),
        }
    }

    /// Balance, per-action counts and history for the dashboard.
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self, user_id: &str) -> Result<DashboardStats, LedgerError> {
        let profile = self.store.read_profile(user_id).await?;
        let full_history = self.store.read_history(user_id).await?;

        let count = |action: HistoryAction| {
            full_history
                .iter()
                .filter(|e| e.kind() == Some(action))
                .count()
        };
        let total_scans = count(HistoryAction::QrScan);
        let total_redeemed = count(HistoryAction::CouponRedeem);
        let recent_history = full_history
            .iter()
            .take(RECENT_ACTIVITY_LIMIT)
            .cloned()
            .collect();

        Ok(DashboardStats {
            points: profile.points,
            total_scans,
            total_redeemed,
            recent_history,
            full_history,
        })
    }
}
