//! `SQLite` database for `EcoBin`.

pub use ecobin_core::db::DatabaseError;

ecobin_core::define_database!(RewardsDatabase, "Rewards database migrations complete");
