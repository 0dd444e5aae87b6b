//! Account lifecycle and auth state signals.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use ecobin_core::config::AuthConfig;
use ecobin_core::db::unix_timestamp;

use super::error::AuthError;
use super::jwt::{self, JwtManager};
use super::password;
use crate::storage::{DatabaseError, NewAccount, RewardsDatabase, User};

const EVENT_CAPACITY: usize = 64;

/// Auth state changes, delivered to subscribers in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String, username: String },
    SignedOut { user_id: String },
    PasswordRecovery { user_id: String },
}

/// Credentials handed to a client after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub user_id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_secs: i64,
}

pub struct IdentityService {
    db: RewardsDatabase,
    jwt: JwtManager,
    policy: AuthConfig,
    events: broadcast::Sender<AuthEvent>,
}

impl IdentityService {
    pub fn new(db: RewardsDatabase, jwt: JwtManager, policy: AuthConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            jwt,
            policy,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub const fn database(&self) -> &RewardsDatabase {
        &self.db
    }

    fn emit(&self, event: AuthEvent) {
        if self.events.send(event).is_err() {
            debug!("No auth event subscribers");
        }
    }

    fn check_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.policy.min_password_len {
            return Err(AuthError::InvalidInput(format!(
                "Password must be at least {} characters",
                self.policy.min_password_len
            )));
        }
        Ok(())
    }

    /// Create an account with a zero-point profile and sign it in.
    #[instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthTokens, AuthError> {
        if username.trim().chars().count() < self.policy.min_username_len {
            return Err(AuthError::InvalidInput(format!(
                "Username must be at least {} characters",
                self.policy.min_username_len
            )));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput("Invalid email address".into()));
        }
        self.check_password(password)?;

        if self.db.get_user_by_username(username).await.is_ok() {
            return Err(AuthError::AlreadyExists("Username already taken".into()));
        }
        if self.db.get_user_by_email(email).await.is_ok() {
            return Err(AuthError::AlreadyExists("Email already registered".into()));
        }

        let hash = password::hash_password(password)?;
        let user_id = uuid::Uuid::new_v4().to_string();
        let user = self
            .db
            .create_account(&NewAccount {
                id: &user_id,
                username,
                email,
                password_hash: &hash,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => {
                    AuthError::AlreadyExists("Username or email already registered".into())
                }
                other => AuthError::Storage(other),
            })?;

        let tokens = self.issue_session(&user).await?;
        info!(user_id = %user.id, username = %user.username, "User registered");
        self.emit(AuthEvent::SignedIn {
            user_id: user.id,
            username: user.username,
        });
        Ok(tokens)
    }

    /// Sign in with an email address or username.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<AuthTokens, AuthError> {
        let user = match self.db.get_user_by_login(login).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound(_)) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !password::verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Failed sign-in attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_session(&user).await?;
        info!(user_id = %user.id, username = %user.username, "User signed in");
        self.emit(AuthEvent::SignedIn {
            user_id: user.id,
            username: user.username,
        });
        Ok(tokens)
    }

    /// Restore a persisted session, rotating the refresh token when the
    /// access token has expired.
    #[instrument(skip_all)]
    pub async fn resume(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<AuthTokens, AuthError> {
        let tokens = match self.jwt.validate(access_token) {
            Ok(claims) if claims.is_access() => {
                let stored = self
                    .db
                    .get_token_by_hash(&JwtManager::hash_token(refresh_token))
                    .await?
                    .ok_or(AuthError::InvalidToken)?;
                if stored.user_id != claims.sub {
                    return Err(AuthError::InvalidToken);
                }
                let user = self.user_for_token(&claims.sub).await?;
                AuthTokens {
                    user_id: user.id,
                    username: user.username,
                    access_token: access_token.to_string(),
                    refresh_token: refresh_token.to_string(),
                    expires_in_secs: claims.exp - unix_timestamp(),
                }
            }
            Err(e) if jwt::is_expired(&e) => {
                debug!("Access token expired, rotating refresh token");
                self.refresh(refresh_token).await?
            }
            _ => return Err(AuthError::InvalidToken),
        };

        info!(user_id = %tokens.user_id, "Session resumed");
        self.emit(AuthEvent::SignedIn {
            user_id: tokens.user_id.clone(),
            username: tokens.username.clone(),
        });
        Ok(tokens)
    }

    /// Exchange a refresh token for a new pair; the old one is revoked.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let claims = self
            .jwt
            .validate(refresh_token)
            .map_err(|_| AuthError::InvalidToken)?;
        if !claims.is_refresh() {
            return Err(AuthError::InvalidToken);
        }

        let stored = self
            .db
            .get_token_by_hash(&JwtManager::hash_token(refresh_token))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        // Rotation. A concurrent refresh with the same token loses here.
        if !self.db.revoke_token(&stored.id).await? {
            warn!(user_id = %stored.user_id, "Refresh token replayed");
            return Err(AuthError::InvalidToken);
        }

        let user = self.user_for_token(&claims.sub).await?;
        self.issue_session(&user).await
    }

    /// Revoke the session's refresh token. Returns whether a live token
    /// was found.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, refresh_token: &str) -> Result<bool, AuthError> {
        let Some(stored) = self
            .db
            .get_token_by_hash(&JwtManager::hash_token(refresh_token))
            .await?
        else {
            return Ok(false);
        };

        let revoked = self.db.revoke_token(&stored.id).await?;
        info!(user_id = %stored.user_id, "User signed out");
        self.emit(AuthEvent::SignedOut {
            user_id: stored.user_id,
        });
        Ok(revoked)
    }

    /// Issue a single-use recovery token for the account with this email.
    /// `None` when no account matches.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<Option<String>, AuthError> {
        let user = match self.db.get_user_by_email(email).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound(_)) => {
                debug!("Password reset requested for unknown email");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let issued = self.jwt.issue_recovery_token(&user.id, &user.username)?;
        self.db
            .create_token(
                &uuid::Uuid::new_v4().to_string(),
                &user.id,
                &JwtManager::hash_token(&issued.token),
                issued.expires_at,
            )
            .await?;

        info!(user_id = %user.id, "Password recovery issued");
        self.emit(AuthEvent::PasswordRecovery { user_id: user.id });
        Ok(Some(issued.token))
    }

    /// Set a new password using a recovery token. Every outstanding token
    /// of the user is revoked, signing out all sessions.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        recovery_token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.check_password(new_password)?;

        let claims = self
            .jwt
            .validate(recovery_token)
            .map_err(|_| AuthError::InvalidToken)?;
        if !claims.is_recovery() {
            return Err(AuthError::InvalidToken);
        }
        let stored = self
            .db
            .get_token_by_hash(&JwtManager::hash_token(recovery_token))
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !self.db.revoke_token(&stored.id).await? {
            warn!(user_id = %claims.sub, "Recovery token replayed");
            return Err(AuthError::InvalidToken);
        }

        let hash = password::hash_password(new_password)?;
        self.db.update_password_hash(&claims.sub, &hash).await?;
        let revoked = self.db.revoke_user_tokens(&claims.sub).await?;

        info!(user_id = %claims.sub, revoked, "Password reset");
        Ok(())
    }

    async fn user_for_token(&self, user_id: &str) -> Result<User, AuthError> {
        match self.db.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(DatabaseError::NotFound(_)) => Err(AuthError::InvalidToken),
            Err(e) => Err(e.into()),
        }
    }

    async fn issue_session(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let access = self.jwt.issue_access_token(&user.id, &user.username)?;
        let refresh = self.jwt.issue_refresh_token(&user.id, &user.username)?;

        self.db
            .create_token(
                &uuid::Uuid::new_v4().to_string(),
                &user.id,
                &JwtManager::hash_token(&refresh.token),
                refresh.expires_at,
            )
            .await?;

        Ok(AuthTokens {
            user_id: user.id.clone(),
            username: user.username.clone(),
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in_secs: self.jwt.access_ttl_secs(),
        })
    }
}
