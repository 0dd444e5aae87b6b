//! User-facing notices for ledger and identity outcomes.

use std::fmt;

use serde::Serialize;

use crate::auth::AuthError;
use crate::ledger::{LedgerError, Redemption, ScanReceipt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A short message shown after a user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn scan_awarded(receipt: &ScanReceipt) -> Self {
        Self::new(
            NoticeLevel::Success,
            format!("+{} points added!", receipt.points_awarded),
        )
    }

    pub fn redeemed(redemption: &Redemption) -> Self {
        Self::new(
            NoticeLevel::Success,
            format!("Coupon \"{}\" redeemed!", redemption.coupon.name),
        )
    }

    pub fn scan_failed(err: &LedgerError) -> Self {
        match err {
            LedgerError::InvalidCode => Self::new(
                NoticeLevel::Error,
                "Invalid QR Code. Please scan the one on the dustbin.",
            ),
            LedgerError::CooldownActive { remaining_minutes } => Self::new(
                NoticeLevel::Warning,
                format!("Please wait {remaining_minutes} more minute(s) to scan again."),
            ),
            LedgerError::NotAuthenticated => Self::login_to_scan(),
            LedgerError::ProfileUnavailable(_) => Self::profile_unavailable(),
            _ => Self::new(
                NoticeLevel::Error,
                "An error occurred while processing the scan.",
            ),
        }
    }

    pub fn redeem_failed(err: &LedgerError) -> Self {
        match err {
            LedgerError::NotAuthenticated => {
                Self::new(NoticeLevel::Warning, "Please log in to redeem coupons.")
            }
            LedgerError::InsufficientPoints { .. } => {
                Self::new(NoticeLevel::Warning, "Insufficient points!")
            }
            LedgerError::ProfileUnavailable(_) => Self::profile_unavailable(),
            _ => Self::new(
                NoticeLevel::Error,
                "Could not redeem coupon. Please try again.",
            ),
        }
    }

    pub fn auth_failed(err: &AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                Self::new(NoticeLevel::Error, "Invalid login credentials.")
            }
            AuthError::InvalidInput(msg) => Self::new(NoticeLevel::Warning, msg.clone()),
            other => Self::new(NoticeLevel::Error, other.to_string()),
        }
    }

    pub fn login_to_scan() -> Self {
        Self::new(NoticeLevel::Warning, "Please log in to scan QR codes.")
    }

    pub fn profile_unavailable() -> Self {
        Self::new(
            NoticeLevel::Error,
            "Could not load your profile. Please try again.",
        )
    }

    pub fn registered() -> Self {
        Self::new(NoticeLevel::Success, "Registration successful!")
    }

    pub fn signed_out() -> Self {
        Self::new(NoticeLevel::Info, "Logged out successfully!")
    }

    pub fn reset_requested() -> Self {
        Self::new(
            NoticeLevel::Success,
            "Password reset link sent! Check your email.",
        )
    }

    pub fn password_updated() -> Self {
        Self::new(
            NoticeLevel::Success,
            "Password updated successfully! Please log in.",
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}
