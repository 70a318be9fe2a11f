// SPDX-License-Identifier: AGPL-3.0-or-later

//! Errors of the persistence layer and their classification from database error codes.
use std::time::Duration;

use sqlx::migrate::MigrateError;

use crate::types::LogKey;

/// SQLSTATE codes PostgreSQL reports when a transaction lost against a concurrent one.
const POSTGRES_CONFLICT_CODES: [&str; 3] = ["40001", "40P01", "55P03"];

/// SQLSTATE code of a PostgreSQL unique constraint violation.
const POSTGRES_UNIQUE_VIOLATION: &str = "23505";

/// SQLite primary result codes for a busy or locked database.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// SQLite extended result codes for primary key and unique constraint violations.
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// Errors raised by `RevisionStore` implementations.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Log record does not exist or has no base revision.
    #[error("Log record {0} has no base revision")]
    NotFound(LogKey),

    /// Log record was already inserted before.
    #[error("Log record {0} already exists")]
    Duplicate(LogKey),

    /// Input can't be stored.
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Transaction lost a race against a concurrent append on the same log record.
    #[error("Concurrent append on log record {0} could not be serialized")]
    Conflict(LogKey),

    /// Store call did not complete in time.
    #[error("Store call did not complete within {0:?}")]
    Timeout(Duration),

    /// Stored revisions can't be read or have gaps.
    #[error("Stored revisions of log record {key} are corrupt: {reason}")]
    Corrupt {
        /// Log record the revisions belong to.
        key: LogKey,

        /// What is wrong with it.
        reason: String,
    },

    /// Error returned from the database driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database schema could not be migrated.
    #[error("Database migration failed: {0}")]
    Migration(#[from] MigrateError),
}

impl StoreError {
    /// Maps a driver error which occurred while writing to the given log record onto the store
    /// taxonomy, detecting lock contention and serialization failures.
    pub(crate) fn classify(error: sqlx::Error, key: LogKey) -> Self {
        match database_code(&error) {
            Some(code) if is_conflict(&code) || is_unique_violation(&code) => Self::Conflict(key),
            _ => Self::Database(error),
        }
    }

    /// Maps a driver error which occurred while inserting the given log record, reporting
    /// constraint violations as duplicates.
    pub(crate) fn classify_insert(error: sqlx::Error, key: LogKey) -> Self {
        match database_code(&error) {
            Some(code) if is_unique_violation(&code) => Self::Duplicate(key),
            Some(code) if is_conflict(&code) => Self::Conflict(key),
            _ => Self::Database(error),
        }
    }

    /// Returns true if retrying the operation might succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

fn database_code(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(err) => err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// SQLite reports numeric result codes, PostgreSQL five character SQLSTATE codes.
fn sqlite_code(code: &str) -> Option<i32> {
    if code.len() >= 5 {
        return None;
    }

    code.parse().ok()
}

fn is_conflict(code: &str) -> bool {
    if POSTGRES_CONFLICT_CODES.contains(&code) {
        return true;
    }

    // Extended result codes carry the primary code in their lowest byte
    matches!(
        sqlite_code(code).map(|code| code & 0xff),
        Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)
    )
}

fn is_unique_violation(code: &str) -> bool {
    code == POSTGRES_UNIQUE_VIOLATION
        || matches!(
            sqlite_code(code),
            Some(SQLITE_CONSTRAINT_PRIMARYKEY) | Some(SQLITE_CONSTRAINT_UNIQUE)
        )
}
