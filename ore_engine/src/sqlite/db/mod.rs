//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions that accept a `&mut SqliteConnection` argument. Callers can obtain a
//! connection from a pool, or open an atomic transaction and pass that through instead, without any other changes.
//!
//! SQLite upgrades a read lock to a write lock lazily, and that upgrade fails immediately (rather than waiting) if
//! another writer got in first. Transactions in this crate therefore always issue their first write before any read.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod carts;
pub mod orders;
pub mod products;
pub mod shipping_rates;

const SQLITE_DB_URL: &str = "sqlite://data/ore_store.db";

pub fn db_url() -> String {
    let result = env::var("ORE_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ ORE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
