//! Scanner actor: serializes QR decodes for one session.
//!
//! ```text
//! Idle --Start (signed in)--> Active --Decoded--> Processing --done--> Idle
//! Active --Stop--> Idle
//! ```
//!
//! A decode stops the scanner before it is processed, so each activation
//! processes at most one decode. Decodes that arrive while idle are dropped.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info};

use super::Session;
use crate::ledger::{LedgerError, ScanReceipt};
use crate::storage::RewardsStore;

const COMMAND_BUFFER: usize = 32;
const NOTICE_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerCommand {
    Start,
    Stop,
    Decoded(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Active,
    Processing,
}

/// Emitted by the actor in the order its commands were handled.
#[derive(Debug)]
pub enum ScanNotice {
    Started,
    Stopped,
    /// `Start` was sent while nobody is signed in.
    LoginRequired,
    Completed(Result<ScanReceipt, LedgerError>),
}

#[derive(Debug, thiserror::Error)]
#[error("Scanner task has stopped")]
pub struct ScannerClosed;

/// Cloneable handle to a running scanner actor.
#[derive(Clone)]
pub struct ScannerHandle {
    commands: mpsc::Sender<ScannerCommand>,
    state: watch::Receiver<ScannerState>,
}

impl ScannerHandle {
    pub async fn start(&self) -> Result<(), ScannerClosed> {
        self.send(ScannerCommand::Start).await
    }

    pub async fn stop(&self) -> Result<(), ScannerClosed> {
        self.send(ScannerCommand::Stop).await
    }

    /// Deliver text read by the camera or another QR source.
    pub async fn decoded(&self, text: impl Into<String>) -> Result<(), ScannerClosed> {
        self.send(ScannerCommand::Decoded(text.into())).await
    }

    pub async fn send(&self, command: ScannerCommand) -> Result<(), ScannerClosed> {
        self.commands.send(command).await.map_err(|_| ScannerClosed)
    }

    pub fn state(&self) -> ScannerState {
        *self.state.borrow()
    }
}

/// Spawn a scanner actor for `session`. The actor exits once every handle
/// is dropped or the notice receiver is closed.
pub fn spawn_scanner<S>(
    session: Arc<Mutex<Session<S>>>,
) -> (ScannerHandle, mpsc::Receiver<ScanNotice>)
where
    S: RewardsStore + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (notice_tx, notice_rx) = mpsc::channel(NOTICE_BUFFER);
    let (state_tx, state_rx) = watch::channel(ScannerState::Idle);

    tokio::spawn(run(session, cmd_rx, notice_tx, state_tx));

    (
        ScannerHandle {
            commands: cmd_tx,
            state: state_rx,
        },
        notice_rx,
    )
}

async fn run<S: RewardsStore>(
    session: Arc<Mutex<Session<S>>>,
    mut commands: mpsc::Receiver<ScannerCommand>,
    notices: mpsc::Sender<ScanNotice>,
    state: watch::Sender<ScannerState>,
) {
    while let Some(command) = commands.recv().await {
        let current = *state.borrow();
        let notice = match (current, command) {
            (ScannerState::Idle, ScannerCommand::Start) => {
                if session.lock().await.is_signed_in() {
                    state.send_replace(ScannerState::Active);
                    Some(ScanNotice::Started)
                } else {
                    Some(ScanNotice::LoginRequired)
                }
            }
            (ScannerState::Active, ScannerCommand::Stop) => {
                state.send_replace(ScannerState::Idle);
                Some(ScanNotice::Stopped)
            }
            (ScannerState::Active, ScannerCommand::Decoded(text)) => {
                state.send_replace(ScannerState::Processing);
                let result = session.lock().await.record_scan(&text).await;
                info!(accepted = result.is_ok(), "Scan processed");
                state.send_replace(ScannerState::Idle);
                Some(ScanNotice::Completed(result))
            }
            (_, ScannerCommand::Decoded(_)) => {
                debug!(state = ?current, "Dropping decode while scanner inactive");
                None
            }
            _ => None,
        };

        if let Some(notice) = notice
            && notices.send(notice).await.is_err()
        {
            break;
        }
    }
    debug!("Scanner actor exiting");
}
