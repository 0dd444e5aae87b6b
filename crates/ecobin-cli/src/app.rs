//! Wiring for one CLI invocation: identity, ledger, session and the
//! persisted credentials.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use ecobin_core::Config;
use ecobin_ledger::auth::{AuthError, AuthEvent, AuthTokens, IdentityService, JwtManager};
use ecobin_ledger::catalog::Catalog;
use ecobin_ledger::ledger::{Ledger, LedgerError, LedgerRules};
use ecobin_ledger::session::{Notice, NoticeLevel, Session};
use ecobin_ledger::storage::RewardsDatabase;

use crate::config::CliState;

pub type SharedSession = Arc<Mutex<Session<RewardsDatabase>>>;

pub struct App {
    identity: IdentityService,
    session: SharedSession,
    events: broadcast::Receiver<AuthEvent>,
    state: CliState,
    state_path: PathBuf,
}

impl App {
    pub fn new(
        db: RewardsDatabase,
        config: &Config,
        jwt_secret: &[u8],
        state_path: PathBuf,
    ) -> Self {
        let identity = IdentityService::new(
            db.clone(),
            JwtManager::from_config(jwt_secret, &config.auth),
            config.auth.clone(),
        );
        let events = identity.subscribe();
        let ledger = Ledger::new(db, LedgerRules::from(&config.ledger), Catalog::default());

        Self {
            identity,
            session: Arc::new(Mutex::new(Session::new(Arc::new(ledger)))),
            events,
            state: CliState::load_from(&state_path),
            state_path,
        }
    }

    pub const fn identity(&self) -> &IdentityService {
        &self.identity
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub const fn state(&self) -> &CliState {
        &self.state
    }

    /// Resume the persisted session, if any.
    ///
    /// Returns a notice when stored credentials had to be discarded.
    pub async fn restore(&mut self) -> anyhow::Result<Option<Notice>> {
        let Some(creds) = self.state.auth.clone() else {
            return Ok(None);
        };

        match self
            .identity
            .resume(&creds.access_token, &creds.refresh_token)
            .await
        {
            Ok(tokens) => {
                if tokens.refresh_token != creds.refresh_token {
                    debug!(user_id = %tokens.user_id, "Refresh token rotated");
                }
                self.remember(tokens)?;
                Ok(self.sync().await)
            }
            Err(AuthError::InvalidToken) => {
                warn!(user_id = %creds.user_id, "Stored session is no longer valid");
                self.forget()?;
                Ok(Some(Notice::new(
                    NoticeLevel::Warning,
                    "Your session has expired. Please log in again.",
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply pending auth events to the session.
    ///
    /// A profile that cannot be loaded signs the user out and revokes the
    /// stored credentials.
    pub async fn sync(&mut self) -> Option<Notice> {
        let mut notice = None;
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth events lagged");
                    continue;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            };

            let result = self.session.lock().await.handle_auth_event(&event).await;
            if let Err(LedgerError::ProfileUnavailable(e)) = result {
                warn!(error = %e, "Revoking credentials after profile load failure");
                self.revoke_stored().await;
                notice = Some(Notice::profile_unavailable());
            }
        }
        notice
    }

    async fn revoke_stored(&mut self) {
        if let Some(creds) = self.state.auth.take()
            && let Err(e) = self.identity.sign_out(&creds.refresh_token).await
        {
            warn!(error = %e, "Failed to revoke refresh token");
        }
        if let Err(e) = self.state.save_to(&self.state_path) {
            warn!(error = %e, "Failed to clear stored credentials");
        }
    }

    pub fn remember(&mut self, tokens: AuthTokens) -> anyhow::Result<()> {
        self.state.set_auth(tokens);
        self.state.save_to(&self.state_path)
    }

    pub fn forget(&mut self) -> anyhow::Result<()> {
        self.state.clear_auth();
        self.state.save_to(&self.state_path)
    }
}
