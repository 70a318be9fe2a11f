// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::StoreEncoding;

/// Configuration object holding all important variables throughout the application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    /// URL / connection string to PostgreSQL or SQLite database.
    pub database_url: String,

    /// Maximum number of connections that the database pool should maintain.
    pub database_max_connections: u32,

    /// Physical layout of the revision history in the database.
    ///
    /// Either "normalized" (one row per revision) or "ledger" (one row per log record holding an
    /// ordered JSON array of revisions). Both expose identical behaviour.
    pub store_encoding: StoreEncoding,

    /// Upper bound in milliseconds for every single store call.
    ///
    /// Reads running into this limit return empty results, appends report the failure back to
    /// the caller.
    pub store_timeout_ms: u64,

    /// How often an append is retried when it lost a race against a concurrent editor of the same
    /// log record.
    pub append_retries: u32,
}

impl Configuration {
    /// Returns the store timeout as a `Duration`.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            database_max_connections: 8,
            store_encoding: StoreEncoding::default(),
            store_timeout_ms: 5_000,
            append_retries: 3,
        }
    }
}
