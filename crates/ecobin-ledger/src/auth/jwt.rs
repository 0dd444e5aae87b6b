//! JWT token issuance and validation.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};

use ecobin_core::config::AuthConfig;
use ecobin_core::db::unix_timestamp;

use super::claims::{Claims, TokenKind};

/// A freshly signed token and its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Manages JWT token creation and validation.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    recovery_ttl_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
            recovery_ttl_secs: AuthConfig::default().recovery_ttl_secs,
        }
    }

    pub fn from_config(secret: &[u8], config: &AuthConfig) -> Self {
        Self {
            recovery_ttl_secs: config.recovery_ttl_secs,
            ..Self::new(secret, config.access_ttl_secs, config.refresh_ttl_secs)
        }
    }

    pub const fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn issue_access_token(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        self.issue(user_id, username, TokenKind::Access, self.access_ttl_secs)
    }

    pub fn issue_refresh_token(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        self.issue(user_id, username, TokenKind::Refresh, self.refresh_ttl_secs)
    }

    pub fn issue_recovery_token(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        self.issue(user_id, username, TokenKind::Recovery, self.recovery_ttl_secs)
    }

    fn issue(
        &self,
        user_id: &str,
        username: &str,
        kind: TokenKind,
        ttl_secs: i64,
    ) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        let now = unix_timestamp();
        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now,
            exp: now + ttl_secs,
            kind,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Validate a token's signature and expiry and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Hash a token for storage; raw tokens are never persisted.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Whether a validation failure was only due to expiry.
pub fn is_expired(err: &jsonwebtoken::errors::Error) -> bool {
    matches!(
        err.kind(),
        jsonwebtoken::errors::ErrorKind::ExpiredSignature
    )
}
