// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use sqlx::migrate::MigrateDatabase;
use sqlx::Any;

use crate::db::{
    connection_pool, create_database, run_pending_migrations, LedgerStore, NormalizedStore, Pool,
    RevisionStore, StoreEncoding,
};
use crate::ChangeLogService;

/// Maximum number of connections tests open to the database.
const TEST_MAX_CONNECTIONS: u32 = 8;

/// Create test database from scratch.
pub async fn initialize_db(url: &str) -> Pool {
    // Reset database first
    if Any::database_exists(url).await.unwrap() {
        Any::drop_database(url).await.unwrap();
    }
    create_database(url).await.unwrap();

    // Create connection pool and run all migrations
    let pool = connection_pool(url, TEST_MAX_CONNECTIONS).await.unwrap();
    run_pending_migrations(&pool)
        .await
        .expect("Could not run migrations on test database");

    pool
}

/// Store and service handed to every test, backed by a freshly migrated database.
pub struct TestDatabase {
    /// Encoding of the store.
    pub encoding: StoreEncoding,

    /// Underlying connection pool, for inspecting tables directly.
    pub pool: Pool,

    /// Store in the requested encoding.
    pub store: Arc<dyn RevisionStore>,

    /// Service on top of the store, using the default configuration.
    pub service: ChangeLogService,
}

impl TestDatabase {
    pub fn new(encoding: StoreEncoding, pool: Pool) -> Self {
        let store: Arc<dyn RevisionStore> = match encoding {
            StoreEncoding::Normalized => Arc::new(NormalizedStore::new(pool.clone())),
            StoreEncoding::Ledger => Arc::new(LedgerStore::new(pool.clone())),
        };

        let config = crate::Configuration {
            store_encoding: encoding,
            ..crate::Configuration::default()
        };

        Self {
            encoding,
            pool,
            service: ChangeLogService::new(store.clone(), &config),
            store,
        }
    }
}
