//! Database layer.
//!
//! One SQLite file backs the whole analytical store; every service gets its
//! own table inside it. `Dao` is the only thing in the crate that issues SQL.

mod dao;
mod error;
mod results;

#[cfg(test)]
mod tests;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

pub use dao::Dao;
pub use error::DbError;
pub use results::{Average, AverageResult, Count, CountResult};

/// Open (creating if absent) the SQLite database at `path` and return a pool.
pub async fn create_pool(path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(false);

    let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;

    info!(database = path, "connected to SQLite");
    Ok(pool)
}
