//! Identity for `EcoBin`: accounts, JWT sessions and password recovery.
//!
//! [`IdentityService`] owns the account lifecycle and publishes
//! [`AuthEvent`]s on a broadcast channel; sessions subscribe to it.

pub mod claims;
mod error;
mod identity;
pub mod jwt;
pub mod password;


pub use claims::{Claims, TokenKind};
pub use error::AuthError;
pub use identity::{AuthEvent, AuthTokens, IdentityService};
pub use jwt::JwtManager;
