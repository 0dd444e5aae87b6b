//! JWT claims for `EcoBin` sessions.

use serde::{Deserialize, Serialize};

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    /// Single-use password reset grant.
    Recovery,
}

/// JWT claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// JWT ID (unique per token).
    pub jti: String,
    /// Subject (user ID).
    pub sub: String,
    pub username: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
    pub kind: TokenKind,
}

impl Claims {
    pub fn is_access(&self) -> bool {
        self.kind == TokenKind::Access
    }

    pub fn is_refresh(&self) -> bool {
        self.kind == TokenKind::Refresh
    }

    pub fn is_recovery(&self) -> bool {
        self.kind == TokenKind::Recovery
    }
}
