//! `EcoBin` CLI
//!
//! Scan dust bin QR codes for points, redeem coupons and check the
//! dashboard from the terminal.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use ecobin_cli::app::App;
use ecobin_cli::auth_cmd::{self, AuthAction};
use ecobin_cli::config::{CliState, load_or_create_secret};
use ecobin_cli::rewards_cmd::{self, RewardsCommand};
use ecobin_core::config::load_config;
use ecobin_ledger::storage::RewardsDatabase;

#[derive(Parser, Debug)]
#[command(name = "ecobin")]
#[command(version, about = "Earn points for recycling and redeem coupons", long_about = None)]
struct Cli {
    /// Database path (overrides settings).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Token signing secret. Generated under ~/.ecobin when unset.
    #[arg(long, global = true, env = "ECOBIN_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Log level (overrides settings).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// OTLP endpoint for traces and metrics (requires the `metrics` feature).
    #[arg(long, global = true, env = "ECOBIN_METRICS_ENDPOINT")]
    metrics_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Account management.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    #[command(flatten)]
    Rewards(RewardsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().ok();
    let config = load_config(cwd.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter =
        format!("ecobin={level},ecobin_cli={level},ecobin_ledger={level},ecobin_core={level}");
    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    let metrics_guard = ecobin_core::tracing_init::init_tracing_with_metrics(
        &filter,
        cli.log_json,
        cli.metrics_endpoint.as_deref(),
    );

    debug!(version = env!("CARGO_PKG_VERSION"), "Starting ecobin CLI");

    let db_path = cli
        .db_path
        .or_else(|| config.storage.database_path.clone())
        .or_else(ecobin_core::config::database_path)
        .context("Could not determine database path")?;
    let state_dir = CliState::state_dir().context("Could not determine home directory")?;
    let state_path = CliState::credentials_path().context("Could not determine home directory")?;

    let secret = match cli.jwt_secret {
        Some(secret) => secret,
        None => load_or_create_secret(&state_dir.join("jwt_secret"))?,
    };

    let db = RewardsDatabase::open(&db_path).await?;

    let mut app = App::new(db, &config, secret.as_bytes(), state_path);
    let mut stdout = io::stdout();
    let outcome = match cli.command {
        Command::Auth { action } => auth_cmd::run(action, &mut app, &mut stdout).await?,
        Command::Rewards(command) => rewards_cmd::run(command, &mut app, &mut stdout).await?,
    };

    #[cfg(feature = "metrics")]
    if let Some(guard) = metrics_guard
        && let Err(e) = guard.shutdown()
    {
        tracing::warn!(error = %e, "Failed to flush telemetry");
    }

    Ok(outcome.into())
}
