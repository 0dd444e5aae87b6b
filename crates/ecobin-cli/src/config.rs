//! CLI credential storage.
//!
//! Persists the signed-in session to `~/.ecobin/credentials.json` and the
//! local token signing secret to `~/.ecobin/jwt_secret`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ecobin_ledger::auth::AuthTokens;

/// Persistent CLI state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<CliCredentials>,
}

/// Stored session credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliCredentials {
    pub user_id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<AuthTokens> for CliCredentials {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            user_id: tokens.user_id,
            username: tokens.username,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

impl CliState {
    /// Path to the state directory: `~/.ecobin/`.
    pub fn state_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".ecobin"))
    }

    /// Path to the credentials file: `~/.ecobin/credentials.json`.
    pub fn credentials_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("credentials.json"))
    }

    /// Load state from `path`. Missing or unreadable files yield the default.
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        restrict_to_owner(path)?;
        Ok(())
    }

    pub fn set_auth(&mut self, tokens: AuthTokens) {
        self.auth = Some(tokens.into());
    }

    pub fn clear_auth(&mut self) {
        self.auth = None;
    }
}

/// Load the local token signing secret, creating one on first use.
pub fn load_or_create_secret(path: &Path) -> anyhow::Result<String> {
    if let Ok(secret) = std::fs::read_to_string(path) {
        let secret = secret.trim();
        if !secret.is_empty() {
            return Ok(secret.to_string());
        }
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let secret = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    std::fs::write(path, &secret)?;
    restrict_to_owner(path)?;
    Ok(secret)
}

/// Files under `~/.ecobin` hold live credentials: owner read/write only.
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
