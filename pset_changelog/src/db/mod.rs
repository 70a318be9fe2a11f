// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistent storage of the change log supporting both PostgreSQL and SQLite databases.
//!
//! The main interface is [`RevisionStore`], implemented by [`NormalizedStore`] (one row per
//! revision) and [`LedgerStore`] (one row per log record holding a JSON array of revisions).
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Error, Result};
use log::info;
use serde::{Deserialize, Serialize};
use sqlx::any::{Any, AnyPool, AnyPoolOptions};
use sqlx::migrate;
use sqlx::migrate::MigrateDatabase;

use crate::config::Configuration;

pub mod errors;
pub mod models;
pub mod stores;
mod traits;

pub use stores::{LedgerStore, NormalizedStore};
pub use traits::RevisionStore;

/// Re-export of generic connection pool type.
pub type Pool = AnyPool;

/// Physical layout of the revision history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEncoding {
    /// One row per revision in `pset_change_log`.
    #[default]
    Normalized,

    /// One row per log record in `pset_ledger` holding all revisions.
    Ledger,
}

impl fmt::Display for StoreEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEncoding::Normalized => write!(f, "normalized"),
            StoreEncoding::Ledger => write!(f, "ledger"),
        }
    }
}

impl FromStr for StoreEncoding {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "normalized" => Ok(StoreEncoding::Normalized),
            "ledger" => Ok(StoreEncoding::Ledger),
            other => bail!("Unknown store encoding '{}'", other),
        }
    }
}

/// Create database when not existing.
pub async fn create_database(url: &str) -> Result<()> {
    if !Any::database_exists(url).await? {
        Any::create_database(url).await?;
    }

    Ok(())
}

/// Create a database agnostic connection pool.
///
/// Every connection to an in-memory SQLite database would see its own database, the pool is
/// limited to one connection for these.
pub async fn connection_pool(url: &str, max_connections: u32) -> Result<Pool, Error> {
    let max_connections = if is_in_memory(url) {
        1
    } else {
        max_connections
    };

    let pool: Pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;

    Ok(pool)
}

/// Run any pending database migrations from inside the application.
pub async fn run_pending_migrations(pool: &Pool) -> Result<()> {
    migrate!().run(pool).await?;
    Ok(())
}

/// Connects to the configured database, migrates it and returns the store for the configured
/// encoding.
pub async fn open_store(config: &Configuration) -> Result<Arc<dyn RevisionStore>> {
    if !is_in_memory(&config.database_url) {
        create_database(&config.database_url).await?;
    }

    let pool = connection_pool(&config.database_url, config.database_max_connections).await?;
    if let Err(err) = run_pending_migrations(&pool).await {
        pool.close().await;
        return Err(err);
    }

    info!(
        "Opened change log store with {} encoding",
        config.store_encoding
    );

    let store: Arc<dyn RevisionStore> = match config.store_encoding {
        StoreEncoding::Normalized => Arc::new(NormalizedStore::new(pool)),
        StoreEncoding::Ledger => Arc::new(LedgerStore::new(pool)),
    };

    Ok(store)
}

fn is_in_memory(url: &str) -> bool {
    url.starts_with("sqlite") && (url.contains(":memory:") || url.contains("mode=memory"))
}
