// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Instant;

use async_trait::async_trait;
use log::{debug, warn};
use sqlx::any::Any;
use sqlx::{query, query_as, query_scalar, Transaction};

use crate::db::errors::StoreError;
use crate::db::models::utils::{now, to_micros};
use crate::db::models::{ChangeLogRow, LogRecordRow};
use crate::db::stores::{with_all_devices, SqlFilter};
use crate::db::{Pool, RevisionStore};
use crate::filter::Predicate;
use crate::types::{LogKey, LogRecord, NewLogRecord, RevNumber, Revision};

/// Columns of `pset_change_log`, in the order `ChangeLogRow` expects them.
const CHANGE_LOG_COLUMNS: &str = "
    log_id,
    controller_id,
    device,
    pset,
    time_last_change,
    rev,
    rev_time,
    \"user\",
    note,
    createdat,
    torque_min,
    torque_target,
    torque_max,
    angle_min,
    angle_target,
    angle_max
";

/// Stores every revision as its own row in `pset_change_log`.
///
/// The identity of each log record is kept in `pset_log_records` as well, appends claim that row
/// first to serialize concurrent writers of the same key.
#[derive(Clone, Debug)]
pub struct NormalizedStore {
    pub(crate) pool: Pool,
}

impl NormalizedStore {
    /// Create a new `NormalizedStore` using the provided db `Pool`.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// Writes one revision row of the given log record.
async fn insert_revision(
    tx: &mut Transaction<'_, Any>,
    record: &LogRecord,
    revision: &Revision,
) -> Result<(), sqlx::Error> {
    let snapshot = &revision.snapshot;

    query(
        "
        INSERT INTO
            pset_change_log (
                log_id,
                controller_id,
                device,
                pset,
                time_last_change,
                rev,
                rev_time,
                \"user\",
                note,
                createdat,
                torque_min,
                torque_target,
                torque_max,
                angle_min,
                angle_target,
                angle_max
            )
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ",
    )
    .bind(record.key.as_i64())
    .bind(record.controller_id.as_str())
    .bind(record.device.as_str())
    .bind(record.pset.as_str())
    .bind(revision.time_last_change.as_ref().map(to_micros))
    .bind(revision.rev.as_i64())
    .bind(to_micros(&revision.created_at))
    .bind(revision.author.clone())
    .bind(revision.note.clone())
    .bind(to_micros(&record.created_at))
    .bind(snapshot.torque_min)
    .bind(snapshot.torque_target)
    .bind(snapshot.torque_max)
    .bind(snapshot.angle_min)
    .bind(snapshot.angle_target)
    .bind(snapshot.angle_max)
    .execute(&mut *tx)
    .await?;

    Ok(())
}

#[async_trait]
impl RevisionStore for NormalizedStore {
    async fn insert(&self, record: &NewLogRecord) -> Result<LogKey, StoreError> {
        let key = record.key;
        let revision = Revision {
            rev: RevNumber::default(),
            created_at: now(),
            author: record.author.clone(),
            note: record.note.clone(),
            time_last_change: record.time_last_change,
            snapshot: record.snapshot,
        };

        // Start a transaction, the log record only becomes visible together with its base
        // revision
        let mut tx = self.pool.begin().await?;

        query(
            "
            INSERT INTO
                pset_log_records (
                    log_id,
                    controller_id,
                    device,
                    pset,
                    createdat,
                    updated_at
                )
            VALUES
                ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(key.as_i64())
        .bind(record.controller_id.as_str())
        .bind(record.device.as_str())
        .bind(record.pset.as_str())
        .bind(to_micros(&record.created_at))
        .bind(to_micros(&revision.created_at))
        .execute(&mut tx)
        .await
        .map_err(|err| StoreError::classify_insert(err, key))?;

        insert_revision(&mut tx, &record.record(), &revision)
            .await
            .map_err(|err| StoreError::classify_insert(err, key))?;

        tx.commit().await?;

        Ok(key)
    }

    async fn append(
        &self,
        key: LogKey,
        note: Option<&str>,
        author: Option<&str>,
    ) -> Result<RevNumber, StoreError> {
        let started = Instant::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StoreError::classify(err, key))?;

        // Claim the log record with a write before reading anything, concurrent appends on the
        // same key wait here until this transaction is finished
        let claimed_at = now();
        let rows_affected = query(
            "
            UPDATE
                pset_log_records
            SET
                updated_at = $1
            WHERE
                log_id = $2
            ",
        )
        .bind(to_micros(&claimed_at))
        .bind(key.as_i64())
        .execute(&mut tx)
        .await
        .map_err(|err| StoreError::classify(err, key))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound(key));
        }

        let latest = query_as::<_, ChangeLogRow>(&format!(
            "
            SELECT
                {}
            FROM
                pset_change_log
            WHERE
                log_id = $1
            ORDER BY
                rev DESC
            LIMIT
                1
            ",
            CHANGE_LOG_COLUMNS
        ))
        .bind(key.as_i64())
        .fetch_optional(&mut tx)
        .await
        .map_err(|err| StoreError::classify(err, key))?
        .ok_or(StoreError::NotFound(key))?;

        let (record, base) = latest.into_parts()?;
        let revision = base.successor(claimed_at, author, note);

        insert_revision(&mut tx, &record, &revision)
            .await
            .map_err(|err| StoreError::classify(err, key))?;

        tx.commit()
            .await
            .map_err(|err| StoreError::classify(err, key))?;

        debug!(
            "Appended revision {} to log record {} in {:?}",
            revision.rev,
            key,
            started.elapsed()
        );

        Ok(revision.rev)
    }

    async fn latest_all(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<(LogRecord, Revision)>, StoreError> {
        let started = Instant::now();
        let filter = SqlFilter::new(predicate, "createdat", "device");

        // Rank the revisions of every log record by revision number and keep the first one
        let sql = format!(
            "
            SELECT
                {columns}
            FROM (
                SELECT
                    {columns},
                    ROW_NUMBER() OVER (PARTITION BY log_id ORDER BY rev DESC) AS rank_number
                FROM
                    pset_change_log
                {filter}
            ) ranked
            WHERE
                rank_number = 1
            ORDER BY
                log_id ASC
            ",
            columns = CHANGE_LOG_COLUMNS,
            filter = filter.sql(),
        );

        let rows = filter
            .bind(query_as::<_, ChangeLogRow>(&sql))
            .fetch_all(&self.pool)
            .await?;

        debug!(
            "Selected {} latest revisions in {:?}",
            rows.len(),
            started.elapsed()
        );

        let mut latest = Vec::with_capacity(rows.len());
        for row in rows {
            let key = LogKey::new(row.log_id);

            // One unreadable revision should not hide all other log records
            match row.into_parts() {
                Ok(parts) => latest.push(parts),
                Err(err) => warn!("Skipping log record {}: {}", key, err),
            }
        }

        Ok(latest)
    }

    async fn log_record(&self, key: LogKey) -> Result<Option<LogRecord>, StoreError> {
        let row = query_as::<_, LogRecordRow>(
            "
            SELECT
                log_id,
                controller_id,
                device,
                pset,
                createdat
            FROM
                pset_log_records
            WHERE
                log_id = $1
            ",
        )
        .bind(key.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(LogRecordRow::into_record).transpose()
    }

    async fn history(&self, key: LogKey) -> Result<Vec<Revision>, StoreError> {
        let started = Instant::now();

        let rows = query_as::<_, ChangeLogRow>(&format!(
            "
            SELECT
                {}
            FROM
                pset_change_log
            WHERE
                log_id = $1
            ORDER BY
                rev ASC
            ",
            CHANGE_LOG_COLUMNS
        ))
        .bind(key.as_i64())
        .fetch_all(&self.pool)
        .await?;

        debug!(
            "Selected {} revisions of log record {} in {:?}",
            rows.len(),
            key,
            started.elapsed()
        );

        rows.into_iter().map(ChangeLogRow::into_revision).collect()
    }

    async fn distinct_devices(&self) -> Result<Vec<String>, StoreError> {
        let devices: Vec<String> = query_scalar(
            "
            SELECT DISTINCT
                device
            FROM
                pset_log_records
            ORDER BY
                device ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(with_all_devices(devices))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
