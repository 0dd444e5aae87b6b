//! Ledger error types.

use crate::storage::DatabaseError;

/// Errors surfaced by ledger and session operations.
///
/// All of them are recoverable at the triggering user action.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid QR code")]
    InvalidCode,

    #[error("Scan cooldown active: {remaining_minutes} minute(s) remaining")]
    CooldownActive { remaining_minutes: i64 },

    #[error("Insufficient points: have {balance}, need {required}")]
    InsufficientPoints { balance: i64, required: i64 },

    #[error("Unknown coupon: {0}")]
    UnknownCoupon(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// The profile could not be loaded after sign-in; the session was signed out.
    #[error("Profile unavailable: {0}")]
    ProfileUnavailable(DatabaseError),
}
