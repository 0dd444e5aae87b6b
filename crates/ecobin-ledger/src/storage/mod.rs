//! `SQLite` storage for `EcoBin`.
//!
//! Provides persistence for users, refresh tokens, profiles, scan cooldown
//! records and the points history, plus the [`RewardsStore`] seam the ledger
//! is written against.

mod db;
mod models;
mod queries;
mod queries_ledger;
mod store;


pub use db::{DatabaseError, RewardsDatabase};
pub use models::*;
pub use queries::NewAccount;
pub use store::RewardsStore;
