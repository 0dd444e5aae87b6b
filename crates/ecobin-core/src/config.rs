//! Configuration resolution for `EcoBin`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/ecobin/settings.json)
//! 3. Project config (.ecobin/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Content of the QR code printed on the deployed dustbin.
pub const DEFAULT_BIN_CODE: &str = "https://qrco.de/bgBWbc";

const MIN_SCAN_REWARD: i64 = 1;
const MIN_COOLDOWN_SECS: i64 = 0;

/// Complete `EcoBin` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Points ledger rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Decoded QR text that counts as a valid bin scan.
    pub bin_code: String,
    /// Points awarded per accepted scan.
    pub scan_reward: i64,
    /// Minimum seconds between two accepted scans of the same bin.
    pub cooldown_secs: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bin_code: DEFAULT_BIN_CODE.to_string(),
            scan_reward: 10,
            cooldown_secs: 5 * 60, // 5 minutes
        }
    }
}

/// Identity and token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    /// Lifetime of a password recovery token.
    pub recovery_ttl_secs: i64,
    pub min_username_len: usize,
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: 3600,
            refresh_ttl_secs: 7 * 24 * 60 * 60, // 7 days
            recovery_ttl_secs: 15 * 60,
            min_username_len: 3,
            min_password_len: 6,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut layers = Vec::new();

    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        layers.push(global_path);
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".ecobin").join("settings.json");
        if project_path.exists() {
            layers.push(project_path);
        }
    }

    let mut config = load_layers(&layers)?;
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Get the default database path.
pub fn database_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("ecobin.db"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".ecobin"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/ecobin"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("ecobin"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Merge settings files in order, key by key, then fill the gaps with
/// defaults. A later file only overrides the keys it actually sets.
fn load_layers(paths: &[PathBuf]) -> Result<Config> {
    let mut merged = Value::Object(serde_json::Map::new());
    for path in paths {
        merge_values(&mut merged, read_settings(path)?);
    }

    let config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    validate(&config)?;
    Ok(config)
}

fn read_settings(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_values(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.ledger.scan_reward < MIN_SCAN_REWARD {
        return Err(Error::Config(format!(
            "ledger.scan_reward must be at least {MIN_SCAN_REWARD}, got {}",
            config.ledger.scan_reward
        )));
    }
    if config.ledger.cooldown_secs < MIN_COOLDOWN_SECS {
        return Err(Error::Config(format!(
            "ledger.cooldown_secs must not be negative, got {}",
            config.ledger.cooldown_secs
        )));
    }
    Ok(())
}

/// Parse a numeric override; out-of-range or malformed values are ignored.
fn parse_override(var: &str, val: &str, min: i64) -> Option<i64> {
    match val.parse::<i64>() {
        Ok(n) if n >= min => Some(n),
        _ => {
            warn!(var, value = val, min, "Ignoring invalid environment override");
            None
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("ECOBIN_BIN_CODE") {
        config.ledger.bin_code = val;
    }
    if let Ok(val) = std::env::var("ECOBIN_SCAN_REWARD")
        && let Some(n) = parse_override("ECOBIN_SCAN_REWARD", &val, MIN_SCAN_REWARD)
    {
        config.ledger.scan_reward = n;
    }
    if let Ok(val) = std::env::var("ECOBIN_COOLDOWN_SECS")
        && let Some(n) = parse_override("ECOBIN_COOLDOWN_SECS", &val, MIN_COOLDOWN_SECS)
    {
        config.ledger.cooldown_secs = n;
    }
    if let Ok(val) = std::env::var("ECOBIN_DB_PATH") {
        config.storage.database_path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("ECOBIN_LOG_LEVEL") {
        config.log_level = val;
    }
}
