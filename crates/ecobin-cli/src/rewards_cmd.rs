//! Rewards subcommands: scan, redeem, coupons, dashboard, history, bin-code.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use ecobin_ledger::ledger::LedgerError;
use ecobin_ledger::session::{Notice, NoticeLevel, ScanNotice, ScannerHandle, spawn_scanner};

use crate::Outcome;
use crate::app::App;
use crate::fmt::{write_coupons, write_dashboard, write_history, write_notice};

/// Rewards subcommands. They act on the stored session.
#[derive(clap::Subcommand, Debug)]
pub enum RewardsCommand {
    /// Submit decoded QR text from the bin.
    Scan {
        /// Decoded QR text.
        #[arg(required_unless_present = "stdin")]
        code: Option<String>,
        /// Read one decoded text per line from stdin.
        #[arg(long, conflicts_with = "code")]
        stdin: bool,
    },
    /// Redeem a coupon from the catalog.
    Redeem {
        /// Coupon ID (see `ecobin coupons`).
        coupon_id: String,
    },
    /// List available coupons.
    Coupons,
    /// Show points, totals and recent activity.
    Dashboard,
    /// Show the full points history.
    History,
    /// Print the text encoded in the bin's QR code.
    BinCode,
}

/// Execute a rewards subcommand after restoring the stored session.
pub async fn run(
    command: RewardsCommand,
    app: &mut App,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    if let Some(notice) = app.restore().await? {
        write_notice(out, &notice)?;
    }

    match command {
        RewardsCommand::Scan { stdin: true, .. } => {
            let reader = tokio::io::BufReader::new(tokio::io::stdin());
            scan_lines(app, reader, out).await
        }
        RewardsCommand::Scan { code, .. } => scan(app, code, out).await,
        RewardsCommand::Redeem { coupon_id } => redeem(app, &coupon_id, out).await,
        RewardsCommand::Coupons => coupons(app, out).await,
        RewardsCommand::Dashboard => dashboard(app, out).await,
        RewardsCommand::History => history(app, out).await,
        RewardsCommand::BinCode => bin_code(app, out).await,
    }
}

/// Scan each decoded text in turn through the scanner actor.
pub async fn scan<I>(app: &App, codes: I, out: &mut impl Write) -> anyhow::Result<Outcome>
where
    I: IntoIterator<Item = String>,
{
    let (scanner, mut notices) = spawn_scanner(app.session());
    let mut outcome = Outcome::Done;
    for code in codes {
        if scan_one(&scanner, &mut notices, code, out).await? == Outcome::Rejected {
            outcome = Outcome::Rejected;
        }
    }
    Ok(outcome)
}

/// Scan one decoded text per non-empty input line until EOF.
pub async fn scan_lines<R>(
    app: &App,
    reader: R,
    out: &mut impl Write,
) -> anyhow::Result<Outcome>
where
    R: AsyncBufRead + Unpin,
{
    let (scanner, mut notices) = spawn_scanner(app.session());
    let mut lines = reader.lines();
    let mut outcome = Outcome::Done;
    while let Some(line) = lines.next_line().await? {
        let code = line.trim();
        if code.is_empty() {
            continue;
        }
        if scan_one(&scanner, &mut notices, code.to_string(), out).await? == Outcome::Rejected {
            outcome = Outcome::Rejected;
        }
    }
    Ok(outcome)
}

async fn scan_one(
    scanner: &ScannerHandle,
    notices: &mut mpsc::Receiver<ScanNotice>,
    code: String,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    scanner.start().await?;
    scanner.decoded(code).await?;

    while let Some(notice) = notices.recv().await {
        match notice {
            ScanNotice::Started => debug!("Scanner started"),
            ScanNotice::Stopped => debug!("Scanner stopped"),
            ScanNotice::LoginRequired => {
                write_notice(out, &Notice::login_to_scan())?;
                return Ok(Outcome::Rejected);
            }
            ScanNotice::Completed(Ok(receipt)) => {
                write_notice(out, &Notice::scan_awarded(&receipt))?;
                writeln!(out, "Points: {}", receipt.new_balance)?;
                return Ok(Outcome::Done);
            }
            ScanNotice::Completed(Err(e)) => {
                write_notice(out, &Notice::scan_failed(&e))?;
                return Ok(Outcome::Rejected);
            }
        }
    }
    anyhow::bail!("Scanner stopped unexpectedly")
}

pub async fn redeem(
    app: &App,
    coupon_id: &str,
    out: &mut impl Write,
) -> anyhow::Result<Outcome> {
    let session = app.session();
    let mut session = session.lock().await;
    match session.redeem(coupon_id).await {
        Ok(redemption) => {
            write_notice(out, &Notice::redeemed(&redemption))?;
            writeln!(out, "Points: {}", redemption.new_balance)?;
            Ok(Outcome::Done)
        }
        Err(e) => {
            write_notice(out, &Notice::redeem_failed(&e))?;
            Ok(Outcome::Rejected)
        }
    }
}

pub async fn coupons(app: &App, out: &mut impl Write) -> anyhow::Result<Outcome> {
    let session = app.session();
    let session = session.lock().await;
    if let Some(profile) = session.profile() {
        writeln!(out, "Points: {}", profile.points)?;
    }
    write_coupons(out, &session.coupons())?;
    Ok(Outcome::Done)
}

pub async fn dashboard(app: &App, out: &mut impl Write) -> anyhow::Result<Outcome> {
    let session = app.session();
    let session = session.lock().await;
    match session.dashboard().await {
        Ok(stats) => {
            write_dashboard(out, &stats)?;
            Ok(Outcome::Done)
        }
        Err(e) => view_failed(&e, out),
    }
}

pub async fn history(app: &App, out: &mut impl Write) -> anyhow::Result<Outcome> {
    let session = app.session();
    let session = session.lock().await;
    match session.dashboard().await {
        Ok(stats) => {
            write_history(out, &stats.full_history)?;
            Ok(Outcome::Done)
        }
        Err(e) => view_failed(&e, out),
    }
}

fn view_failed(err: &LedgerError, out: &mut impl Write) -> anyhow::Result<Outcome> {
    let notice = match err {
        LedgerError::NotAuthenticated => {
            Notice::new(NoticeLevel::Warning, "Please log in to view your points.")
        }
        _ => Notice::profile_unavailable(),
    };
    write_notice(out, &notice)?;
    Ok(Outcome::Rejected)
}

/// Print the text encoded in the bin's QR code.
pub async fn bin_code(app: &App, out: &mut impl Write) -> anyhow::Result<Outcome> {
    let session = app.session();
    let session = session.lock().await;
    writeln!(out, "{}", session.ledger().rules().bin_code)?;
    Ok(Outcome::Done)
}
