//! Identity error types.

use crate::storage::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    AlreadyExists(String),

    /// Expired, revoked, malformed or of the wrong kind.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::PasswordHash(e.to_string())
    }
}
