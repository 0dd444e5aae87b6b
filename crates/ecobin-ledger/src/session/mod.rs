//! Per-user session: the signed-in user, their cached profile and the
//! ledger actions available to them.
//!
//! Auth state arrives as [`AuthEvent`]s; the cached profile is reloaded
//! after every successful mutation.

mod notice;
pub mod scanner;


use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use ecobin_core::db::unix_timestamp;

use crate::auth::AuthEvent;
use crate::catalog::CouponView;
use crate::ledger::{DashboardStats, Ledger, LedgerError, Redemption, ScanReceipt};
use crate::storage::{RewardsStore, UserProfile};

pub use notice::{Notice, NoticeLevel};
pub use scanner::{ScanNotice, ScannerHandle, ScannerState, spawn_scanner};

pub struct Session<S> {
    ledger: Arc<Ledger<S>>,
    user_id: Option<String>,
    profile: Option<UserProfile>,
}

impl<S: RewardsStore> Session<S> {
    /// A signed-out session.
    pub const fn new(ledger: Arc<Ledger<S>>) -> Self {
        Self {
            ledger,
            user_id: None,
            profile: None,
        }
    }

    pub const fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub const fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// Cached profile of the signed-in user.
    pub const fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Apply an auth state change.
    ///
    /// If the profile cannot be loaded after sign-in the session is signed
    /// out again and `ProfileUnavailable` is returned; the caller should
    /// revoke its credentials.
    #[instrument(skip(self))]
    pub async fn handle_auth_event(&mut self, event: &AuthEvent) -> Result<(), LedgerError> {
        match event {
            AuthEvent::SignedIn { user_id, .. } => {
                match self.ledger.store().read_profile(user_id).await {
                    Ok(profile) => {
                        info!(user_id = %user_id, points = profile.points, "Session signed in");
                        self.user_id = Some(user_id.clone());
                        self.profile = Some(profile);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Profile load failed, signing out");
                        self.clear();
                        Err(LedgerError::ProfileUnavailable(e))
                    }
                }
            }
            AuthEvent::SignedOut { user_id } => {
                if self.user_id.as_deref() == Some(user_id.as_str()) {
                    debug!(user_id = %user_id, "Session signed out");
                    self.clear();
                }
                Ok(())
            }
            AuthEvent::PasswordRecovery { .. } => Ok(()),
        }
    }

    fn clear(&mut self) {
        self.user_id = None;
        self.profile = None;
    }

    fn require_user(&self) -> Result<String, LedgerError> {
        self.user_id.clone().ok_or(LedgerError::NotAuthenticated)
    }

    pub async fn record_scan(&mut self, decoded_text: &str) -> Result<ScanReceipt, LedgerError> {
        self.record_scan_at(decoded_text, unix_timestamp()).await
    }

    pub(crate) async fn record_scan_at(
        &mut self,
        decoded_text: &str,
        now: i64,
    ) -> Result<ScanReceipt, LedgerError> {
        let user_id = self.require_user()?;
        let receipt = self.ledger.record_scan(&user_id, decoded_text, now).await?;
        self.reload_profile(&user_id, receipt.new_balance).await;
        Ok(receipt)
    }

    pub async fn redeem(&mut self, coupon_id: &str) -> Result<Redemption, LedgerError> {
        let user_id = self.require_user()?;
        let required = self
            .ledger
            .catalog()
            .find(coupon_id)
            .map(|c| c.points)
            .ok_or_else(|| LedgerError::UnknownCoupon(coupon_id.to_string()))?;
        if let Some(profile) = &self.profile
            && profile.points < required
        {
            return Err(LedgerError::InsufficientPoints {
                balance: profile.points,
                required,
            });
        }

        let redemption = self.ledger.redeem_coupon(&user_id, coupon_id).await?;
        self.reload_profile(&user_id, redemption.new_balance).await;
        Ok(redemption)
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, LedgerError> {
        let user_id = self.require_user()?;
        self.ledger.dashboard_stats(&user_id).await
    }

    /// The catalog as seen by this session.
    pub fn coupons(&self) -> Vec<CouponView> {
        let balance = self.profile.as_ref().map(|p| p.points);
        self.ledger
            .catalog()
            .iter()
            .map(|c| CouponView::new(c, balance))
            .collect()
    }

    /// Refresh the cached profile after a mutation. If the read fails the
    /// cache keeps the balance the mutation reported.
    async fn reload_profile(&mut self, user_id: &str, new_balance: i64) {
        match self.ledger.store().read_profile(user_id).await {
            Ok(profile) => self.profile = Some(profile),
            Err(e) => {
                warn!(user_id, error = %e, "Profile refresh failed");
                if let Some(profile) = self.profile.as_mut() {
                    profile.points = new_balance;
                }
            }
        }
    }
}
