// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt::Debug;

use async_trait::async_trait;

use crate::db::errors::StoreError;
use crate::filter::Predicate;
use crate::types::{LogKey, LogRecord, NewLogRecord, RevNumber, Revision};

/// Persistence of log records and their append-only revision histories.
///
/// Implementations guarantee that revision numbers of one log record are unique, start at zero
/// and increase without gaps, even when `append` is called concurrently for the same key.
#[async_trait]
pub trait RevisionStore: Send + Sync + Debug {
    /// Creates a log record together with its base revision.
    ///
    /// Fails with `StoreError::Duplicate` when the key is already taken.
    async fn insert(&self, record: &NewLogRecord) -> Result<LogKey, StoreError>;

    /// Appends a new revision to the log record, copying the setpoints and `time_last_change` of
    /// the latest revision and attaching author and note.
    ///
    /// Returns the number of the new revision. Fails with `StoreError::NotFound` when the log
    /// record has no base revision.
    async fn append(
        &self,
        key: LogKey,
        note: Option<&str>,
        author: Option<&str>,
    ) -> Result<RevNumber, StoreError>;

    /// Returns the latest revision of every log record matching the predicate, ordered by key.
    async fn latest_all(&self, predicate: &Predicate)
        -> Result<Vec<(LogRecord, Revision)>, StoreError>;

    /// Returns the identity of a log record.
    async fn log_record(&self, key: LogKey) -> Result<Option<LogRecord>, StoreError>;

    /// Returns all revisions of a log record ordered by revision number, empty when the record
    /// does not exist.
    async fn history(&self, key: LogKey) -> Result<Vec<Revision>, StoreError>;

    /// Returns the distinct device names of all log records in ascending order, preceded by the
    /// [`ALL_DEVICES`](crate::filter::ALL_DEVICES) sentinel.
    async fn distinct_devices(&self) -> Result<Vec<String>, StoreError>;

    /// Closes the underlying connection pool.
    async fn close(&self);
}
