// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::time::{sleep, timeout};

use crate::config::Configuration;
use crate::db::errors::StoreError;
use crate::db::{open_store, RevisionStore};
use crate::diff::{diff, Field};
use crate::errors::{ChangeLogError, Result};
use crate::export::{Row, Table};
use crate::filter::{self, FilterSpec};
use crate::types::{LogKey, NewLogRecord, RevNumber};

/// Pause before retrying a conflicting append, multiplied with the number of the attempt.
const APPEND_BACKOFF: Duration = Duration::from_millis(25);

/// Surface of the change log towards user interfaces and exporters.
///
/// Reads degrade to empty results when the store fails or does not answer in time, the failure
/// is logged. Writes report every failure back to the caller.
#[derive(Clone, Debug)]
pub struct ChangeLogService {
    store: Arc<dyn RevisionStore>,
    timeout: Duration,
    append_retries: u32,
}

impl ChangeLogService {
    /// Connects to the configured database and returns a service on top of it.
    pub async fn open(config: &Configuration) -> anyhow::Result<Self> {
        let store = open_store(config).await?;
        Ok(Self::new(store, config))
    }

    /// Returns a service on top of an already opened store.
    pub fn new(store: Arc<dyn RevisionStore>, config: &Configuration) -> Self {
        Self {
            store,
            timeout: config.store_timeout(),
            append_retries: config.append_retries,
        }
    }

    /// Closes the connection to the store.
    pub async fn close(&self) {
        self.store.close().await;
    }

    /// Latest revision of every log record matching the filter selection, ordered by key.
    pub async fn refresh(&self, spec: &FilterSpec) -> Result<Vec<Row>> {
        self.refresh_at(spec, Utc::now()).await
    }

    /// Same as [`refresh`](Self::refresh), with week boundaries determined relative to `now`.
    pub async fn refresh_at(&self, spec: &FilterSpec, now: DateTime<Utc>) -> Result<Vec<Row>> {
        let predicate = filter::resolve(spec, now)?;

        let latest = degrade(
            "refresh",
            self.call(self.store.latest_all(&predicate)).await,
        );

        debug!("Refreshed overview with {} log records", latest.len());

        Ok(latest
            .iter()
            .map(|(record, revision)| Row::new(record, revision))
            .collect())
    }

    /// Appends a revision with note and author to the log record and returns its number.
    ///
    /// Appends losing against concurrent edits of the same log record are retried. Callers
    /// refresh their view afterwards.
    pub async fn edit_note(&self, key: LogKey, note: &str, author: &str) -> Result<RevNumber> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self
                .call(self.store.append(key, Some(note), Some(author)))
                .await
            {
                Ok(rev) => {
                    info!("Appended revision {} to log record {}", rev, key);
                    return Ok(rev);
                }
                Err(StoreError::Conflict(_)) if attempt <= self.append_retries => {
                    warn!(
                        "Append on log record {} conflicted, retrying (attempt {})",
                        key, attempt
                    );
                    sleep(APPEND_BACKOFF * attempt).await;
                }
                Err(StoreError::Conflict(key)) => {
                    return Err(ChangeLogError::Conflict {
                        key,
                        attempts: attempt,
                    })
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Registers a new log record together with its base revision.
    pub async fn insert(&self, record: NewLogRecord) -> Result<LogKey> {
        let record = record.validate()?;
        let key = self.call(self.store.insert(&record)).await?;
        info!("Registered log record {} on device {}", key, record.device);
        Ok(key)
    }

    /// All revisions of the log record as rows, ascending by revision number.
    pub async fn history(&self, key: LogKey) -> Vec<Row> {
        let record = match degrade("history", self.call(self.store.log_record(key)).await) {
            Some(record) => record,
            None => return Vec::new(),
        };

        degrade("history", self.call(self.store.history(key)).await)
            .iter()
            .map(|revision| Row::new(&record, revision))
            .collect()
    }

    /// Fields which differ between two revisions of the log record, addressed by their position
    /// in the ascending history.
    pub async fn compare(&self, key: LogKey, left: usize, right: usize) -> Result<BTreeSet<Field>> {
        let revisions = self.call(self.store.history(key)).await?;

        let revision = |index: usize| {
            revisions.get(index).ok_or_else(|| {
                ChangeLogError::Validation(format!(
                    "Log record {} has no revision at position {} ({} revisions)",
                    key,
                    index,
                    revisions.len()
                ))
            })
        };

        Ok(diff(revision(left)?, revision(right)?))
    }

    /// History of the log record as a labelled table.
    pub async fn export_history(&self, key: LogKey) -> Table {
        Table::from_rows(&self.history(key).await)
    }

    /// Rows returned by [`refresh`](Self::refresh) as a labelled table.
    pub fn export_rows(&self, rows: &[Row]) -> Table {
        Table::from_rows(rows)
    }

    /// Device names to populate filter selections, starting with the "All" sentinel.
    pub async fn devices(&self) -> Vec<String> {
        degrade("devices", self.call(self.store.distinct_devices()).await)
    }

    /// Devices grouped by production line.
    pub async fn device_groups(&self) -> BTreeMap<String, Vec<String>> {
        filter::device_groups(&self.devices().await)
    }

    /// Runs a store call under the configured timeout.
    async fn call<T, F>(&self, future: F) -> std::result::Result<T, StoreError>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        match timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

/// Logs a failed read and falls back to an empty result.
fn degrade<T: Default>(operation: &str, result: std::result::Result<T, StoreError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!("{} failed, returning empty result: {}", operation, err);
            T::default()
        }
    }
}
