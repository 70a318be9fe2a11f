// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::Deserialize;

/// Configuration used in test helper methods.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct TestConfiguration {
    /// Database url (SQLite or PostgreSQL), a fresh SQLite database in a temporary directory is
    /// created for every test when not set.
    ///
    /// Tests against a shared database need to run with `--test-threads=1`, every test resets it.
    pub database_url: Option<String>,
}

impl TestConfiguration {
    pub fn new() -> Self {
        envy::from_env::<TestConfiguration>()
            .expect("Could not read environment variables for test configuration")
    }
}
