//! Data models for `EcoBin` storage.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Token {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: i64,
    pub revoked: i64,
    pub created_at: i64,
}

/// Points balance owned by a user. `id` equals the identity user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub points: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Cooldown anchor for one (user, bin) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScanRecord {
    pub user_id: String,
    pub qr_id: String,
    pub last_scanned_at: i64,
}

/// Immutable ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: String,
    pub action: String,
    pub points_change: i64,
    pub description: String,
    pub created_at: i64,
}

impl HistoryEntry {
    /// Parsed action kind; `None` for values written by a newer schema.
    pub fn kind(&self) -> Option<HistoryAction> {
        self.action.parse().ok()
    }
}

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    QrScan,
    CouponRedeem,
}

impl HistoryAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::QrScan => "qr_scan",
            Self::CouponRedeem => "coupon_redeem",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qr_scan" => Ok(Self::QrScan),
            "coupon_redeem" => Ok(Self::CouponRedeem),
            other => Err(format!("unknown history action: {other}")),
        }
    }
}

/// Parameters for appending a history entry. `created_at` is assigned by the store.
#[derive(Debug, Clone, Copy)]
pub struct NewHistoryEntry<'a> {
    pub user_id: &'a str,
    pub action: HistoryAction,
    pub points_change: i64,
    pub description: &'a str,
}

/// Parameters for the transactional scan award.
#[derive(Debug, Clone, Copy)]
pub struct ScanClaim<'a> {
    pub user_id: &'a str,
    pub qr_id: &'a str,
    pub now: i64,
    pub reward: i64,
    pub cooldown_secs: i64,
    pub description: &'a str,
}

/// Result of [`ScanClaim`] processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAward {
    Awarded { new_balance: i64 },
    /// Another scan inside the cooldown window already holds the record.
    Cooling { last_scanned_at: i64 },
}

/// Parameters for the conditional balance debit.
#[derive(Debug, Clone, Copy)]
pub struct PointsDebit<'a> {
    pub user_id: &'a str,
    pub amount: i64,
    pub description: &'a str,
}

/// Result of [`PointsDebit`] processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited { new_balance: i64 },
    Insufficient { balance: i64 },
}
