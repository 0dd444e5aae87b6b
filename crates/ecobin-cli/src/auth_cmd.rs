//! Auth subcommands: register, login, logout, status, forgot, reset.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;

use ecobin_ledger::auth::{AuthError, AuthTokens};
use ecobin_ledger::session::{Notice, NoticeLevel};

use crate::Outcome;
use crate::app::App;
use crate::fmt::write_notice;

/// Auth subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum AuthAction {
    /// Create an account and log in.
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Log in with an email address or username.
    Login {
        /// Email or username.
        #[arg(short, long)]
        login: String,
        #[arg(short, long)]
        password: String,
    },
    /// Log out and revoke the stored session.
    Logout,
    /// Show current auth status.
    Status,
    /// Request a password recovery token.
    Forgot {
        #[arg(short, long)]
        email: String,
    },
    /// Set a new password with a recovery token.
    Reset {
        #[arg(short, long)]
        token: String,
        #[arg(short, long)]
        password: String,
    },
}

/// Execute an auth subcommand.
pub async fn run(
    action: AuthAction,
    app: &mut App,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    match action {
        AuthAction::Register {
            username,
            email,
            password,
        } => {
            let result = app.identity().register(&username, &email, &password).await;
            signed_in(app, result, |_| Notice::registered(), out).await
        }
        AuthAction::Login { login, password } => {
            let result = app.identity().sign_in(&login, &password).await;
            let welcome = |t: &AuthTokens| {
                Notice::new(NoticeLevel::Success, format!("Logged in as {}", t.username))
            };
            signed_in(app, result, welcome, out).await
        }
        AuthAction::Logout => logout(app, out).await,
        AuthAction::Status => status(app, out).await,
        AuthAction::Forgot { email } => {
            let token = app.identity().request_password_reset(&email).await?;
            write_notice(out, &Notice::reset_requested())?;
            if let Some(token) = token {
                writeln!(out, "Recovery token: {token}")?;
            }
            Ok(Outcome::Done)
        }
        AuthAction::Reset { token, password } => {
            match app.identity().reset_password(&token, &password).await {
                Ok(()) => {
                    app.forget()?;
                    write_notice(out, &Notice::password_updated())?;
                    Ok(Outcome::Done)
                }
                Err(e) => rejected(&e, out),
            }
        }
    }
}

async fn signed_in(
    app: &mut App,
    result: Result<AuthTokens, AuthError>,
    notice: impl FnOnce(&AuthTokens) -> Notice,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    let tokens = match result {
        Ok(tokens) => tokens,
        Err(e) => return rejected(&e, out),
    };
    let notice = notice(&tokens);
    app.remember(tokens)?;
    if let Some(failure) = app.sync().await {
        write_notice(out, &failure)?;
        return Ok(Outcome::Rejected);
    }
    write_notice(out, &notice)?;
    Ok(Outcome::Done)
}

fn rejected(err: &AuthError, out: &mut impl Write) -> anyhow::Result<Outcome> {
    if let AuthError::Storage(e) = err {
        anyhow::bail!("Storage error: {e}");
    }
    write_notice(out, &Notice::auth_failed(err))?;
    Ok(Outcome::Rejected)
}

async fn logout(app: &mut App, out: &mut impl Write) -> anyhow::Result<Outcome> {
    if let Some(creds) = app.state().auth.clone() {
        app.identity().sign_out(&creds.refresh_token).await?;
    }
    app.forget()?;
    write_notice(out, &Notice::signed_out())?;
    Ok(Outcome::Done)
}

async fn status(app: &mut App, out: &mut impl Write) -> anyhow::Result<Outcome> {
    if let Some(notice) = app.restore().await? {
        write_notice(out, &notice)?;
    }
    let session = app.session();
    let session = session.lock().await;
    match session.profile() {
        Some(profile) => {
            writeln!(out, "Logged in as: {}", profile.username)?;
            writeln!(out, "User ID: {}", profile.id)?;
            writeln!(out, "Points: {}", profile.points)?;
        }
        None => writeln!(out, "Not logged in")?,
    }
    Ok(Outcome::Done)
}
