//! `EcoBin` CLI Library
//!
//! Command implementations for the `ecobin` binary. Commands write their
//! output to a caller-supplied writer so they can be exercised in tests.

pub mod app;
pub mod auth_cmd;
pub mod config;
pub mod fmt;
pub mod rewards_cmd;

#[cfg(test)]
mod tests;

use std::process::ExitCode;

/// How a command ended from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The action was refused; a notice explains why.
    Rejected,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Self::SUCCESS,
            Outcome::Rejected => Self::FAILURE,
        }
    }
}
