// SPDX-License-Identifier: AGPL-3.0-or-later

use once_cell::sync::Lazy;

mod config;
mod db;
mod helpers;
mod runner;

pub use config::TestConfiguration;
pub use db::{initialize_db, TestDatabase};
pub use helpers::{new_record, new_record_at};
pub use runner::test_runner;

/// Configuration read from the environment, shared by all tests.
pub static TEST_CONFIG: Lazy<TestConfiguration> = Lazy::new(TestConfiguration::new);
