//! `EcoBin` Rewards Ledger Library
//!
//! Core functionality for `EcoBin`:
//! - `SQLite` storage for users, tokens, profiles, scan records and history
//! - The points ledger (scan cooldown, coupon redemption, dashboard stats)
//! - The coupon catalog
//! - JWT identity with password recovery
//! - Per-user sessions and the scanner actor

pub mod auth;
pub mod catalog;
pub mod ledger;
pub mod session;
pub mod storage;
