// SPDX-License-Identifier: AGPL-3.0-or-later

use std::panic;

use futures::Future;
use tokio::runtime::Builder;

use crate::db::StoreEncoding;
use crate::test_utils::{initialize_db, TestDatabase, TEST_CONFIG};

#[async_trait::async_trait]
pub trait AsyncTestFn {
    async fn call(self, db: TestDatabase);
}

#[async_trait::async_trait]
impl<FN, F> AsyncTestFn for FN
where
    FN: FnOnce(TestDatabase) -> F + Sync + Send,
    F: Future<Output = ()> + Send,
{
    async fn call(self, db: TestDatabase) {
        self(db).await
    }
}

/// Provides a safe way to write tests using a database which closes the pool connection
/// automatically when the test succeeds or fails.
///
/// Takes the store encoding and an (async) test function as arguments and passes over the
/// `TestDatabase` instance so it can be used inside of it.
pub fn test_runner<F: AsyncTestFn + Send + Sync + 'static>(encoding: StoreEncoding, test: F) {
    let runtime = Builder::new_current_thread()
        .worker_threads(1)
        .enable_all()
        .thread_name("with_db_teardown")
        .build()
        .expect("Could not build tokio Runtime for test");

    runtime.block_on(async {
        // Every test gets its own SQLite database unless one was configured
        let data_dir = tempfile::tempdir().expect("Could not create temporary directory");
        let url = match &TEST_CONFIG.database_url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                data_dir.path().join("changelog.sqlite3").display()
            ),
        };

        // Initialise store
        let pool = initialize_db(&url).await;
        let db = TestDatabase::new(encoding, pool.clone());

        // Spawn the test in a separate task to make sure we have control over the possible
        // panics which might happen inside of it
        let handle = tokio::task::spawn(async move {
            // Execute the actual test
            test.call(db).await;
        });

        // Get a handle of the task so we can use it later
        let result = handle.await;

        // Unwind the test by closing down the connection to the database pool. This will
        // be reached even when the test panicked
        pool.close().await;
        drop(data_dir);

        // Panic here when test failed. The test fails within its own async task and stays
        // there, we need to propagate it further to inform the test runtime about the result
        match result {
            Ok(_) => (),
            Err(err) => panic::resume_unwind(err.into_panic()),
        };
    });
}
