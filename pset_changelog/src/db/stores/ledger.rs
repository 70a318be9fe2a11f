// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Instant;

use async_trait::async_trait;
use log::{debug, warn};
use sqlx::{query, query_as, query_scalar};

use crate::db::errors::StoreError;
use crate::db::models::utils::{now, to_micros};
use crate::db::models::{LedgerEntry, LedgerRow};
use crate::db::stores::{with_all_devices, SqlFilter};
use crate::db::{Pool, RevisionStore};
use crate::filter::Predicate;
use crate::types::{LogKey, LogRecord, NewLogRecord, RevNumber, Revision};

const SELECT_LEDGER: &str = "
    SELECT
        id,
        controller_id,
        station,
        pset,
        createdat,
        jsondata
    FROM
        pset_ledger
    WHERE
        id = $1
";

/// Stores all revisions of a log record as one JSON array in the `jsondata` column of
/// `pset_ledger`.
///
/// Appending rewrites the whole array inside a transaction which claimed the row first, so
/// concurrent appends on the same key can't lose each other's revisions.
#[derive(Clone, Debug)]
pub struct LedgerStore {
    pub(crate) pool: Pool,
}

impl LedgerStore {
    /// Create a new `LedgerStore` using the provided db `Pool`.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn encode(key: LogKey, entries: &[LedgerEntry]) -> Result<String, StoreError> {
    serde_json::to_string(entries).map_err(|err| {
        StoreError::Invalid(format!(
            "Can't encode revisions of log record {}: {}",
            key, err
        ))
    })
}

#[async_trait]
impl RevisionStore for LedgerStore {
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
        let jsondata = encode(key, &[LedgerEntry::from(&revision)])?;

        query(
            "
            INSERT INTO
                pset_ledger (
                    id,
                    controller_id,
                    station,
                    pset,
                    createdat,
                    updated_at,
                    jsondata
                )
            VALUES
                ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(key.as_i64())
        .bind(record.controller_id.as_str())
        .bind(record.device.as_str())
        .bind(record.pset.as_str())
        .bind(to_micros(&record.created_at))
        .bind(to_micros(&revision.created_at))
        .bind(jsondata)
        .execute(&self.pool)
        .await
        .map_err(|err| StoreError::classify_insert(err, key))?;

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

        // Claim the ledger row with a write before reading it, concurrent appends on the same
        // key wait here until this transaction is finished
        let claimed_at = now();
        let rows_affected = query(
            "
            UPDATE
                pset_ledger
            SET
                updated_at = $1
            WHERE
                id = $2
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

        let row = query_as::<_, LedgerRow>(SELECT_LEDGER)
            .bind(key.as_i64())
            .fetch_one(&mut tx)
            .await
            .map_err(|err| StoreError::classify(err, key))?;

        let mut entries = row.entries()?;
        let base = entries
            .last()
            .cloned()
            .ok_or(StoreError::NotFound(key))?
            .into_revision(key)?;

        let revision = base.successor(claimed_at, author, note);
        entries.push(LedgerEntry::from(&revision));

        query(
            "
            UPDATE
                pset_ledger
            SET
                jsondata = $1
            WHERE
                id = $2
            ",
        )
        .bind(encode(key, &entries)?)
        .bind(key.as_i64())
        .execute(&mut tx)
        .await
        .map_err(|err| StoreError::classify(err, key))?;

        tx.commit()
            .await
            .map_err(|err| StoreError::classify(err, key))?;

        debug!(
            "Appended revision {} to ledger of log record {} in {:?}",
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
        let filter = SqlFilter::new(predicate, "createdat", "station");

        let sql = format!(
            "
            SELECT
                id,
                controller_id,
                station,
                pset,
                createdat,
                jsondata
            FROM
                pset_ledger
            {}
            ORDER BY
                id ASC
            ",
            filter.sql()
        );

        let rows = filter
            .bind(query_as::<_, LedgerRow>(&sql))
            .fetch_all(&self.pool)
            .await?;

        debug!(
            "Selected {} ledgers in {:?}",
            rows.len(),
            started.elapsed()
        );

        let mut latest = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.record()?;

            // One unreadable ledger should not hide all others
            let mut revisions = match row.revisions() {
                Ok(revisions) => revisions,
                Err(err) => {
                    warn!("Skipping log record {}: {}", record.key, err);
                    continue;
                }
            };

            if let Some(revision) = revisions.pop() {
                latest.push((record, revision));
            }
        }

        Ok(latest)
    }

    async fn log_record(&self, key: LogKey) -> Result<Option<LogRecord>, StoreError> {
        let row = query_as::<_, LedgerRow>(SELECT_LEDGER)
            .bind(key.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(LedgerRow::record).transpose()
    }

    async fn history(&self, key: LogKey) -> Result<Vec<Revision>, StoreError> {
        let row = query_as::<_, LedgerRow>(SELECT_LEDGER)
            .bind(key.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.revisions(),
            None => Ok(Vec::new()),
        }
    }

    async fn distinct_devices(&self) -> Result<Vec<String>, StoreError> {
        let devices: Vec<String> = query_scalar(
            "
            SELECT DISTINCT
                station
            FROM
                pset_ledger
            ORDER BY
                station ASC
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

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use sqlx::{query, query_scalar};

    use crate::db::errors::StoreError;
    use crate::db::StoreEncoding;
    use crate::filter::Predicate;
    use crate::test_utils::{new_record, test_runner, TestDatabase};
    use crate::types::LogKey;

    #[test]
    fn ledger_document_layout() {
        test_runner(StoreEncoding::Ledger, |db: TestDatabase| async move {
            db.store.insert(&new_record(5, "G1-TT 951753")).await.unwrap();
            db.store
                .append(LogKey::new(5), Some("raised limit"), Some("alice"))
                .await
                .unwrap();

            let jsondata: String = query_scalar("SELECT jsondata FROM pset_ledger WHERE id = $1")
                .bind(5_i64)
                .fetch_one(&db.pool)
                .await
                .unwrap();
            let ledger: Value = serde_json::from_str(&jsondata).unwrap();

            let entries = ledger.as_array().unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[1]["rev"], 1);
            assert_eq!(entries[1]["user"], "alice");
            assert_eq!(entries[1]["note"], "raised limit");
            assert_eq!(entries[1]["torque"]["min"], entries[0]["torque"]["min"]);
            assert!(entries[1].get("timeLastChange").is_some());
            assert!(entries[1].get("timestamp").is_some());
        });
    }

    #[test]
    fn corrupt_ledger() {
        test_runner(StoreEncoding::Ledger, |db: TestDatabase| async move {
            db.store.insert(&new_record(1, "D1")).await.unwrap();
            db.store.insert(&new_record(2, "D1")).await.unwrap();

            query("UPDATE pset_ledger SET jsondata = $1 WHERE id = $2")
                .bind("[{\"rev\": 3}]")
                .bind(2_i64)
                .execute(&db.pool)
                .await
                .unwrap();

            assert!(matches!(
                db.store.history(LogKey::new(2)).await,
                Err(StoreError::Corrupt { .. })
            ));

            // Readable ledgers are still listed
            let latest = db.store.latest_all(&Predicate::unrestricted()).await.unwrap();
            assert_eq!(latest.len(), 1);
            assert_eq!(latest[0].0.key, LogKey::new(1));
        });
    }

    #[test]
    fn empty_ledger_has_no_base_revision() {
        test_runner(StoreEncoding::Ledger, |db: TestDatabase| async move {
            db.store.insert(&new_record(9, "D1")).await.unwrap();

            query("UPDATE pset_ledger SET jsondata = '[]' WHERE id = $1")
                .bind(9_i64)
                .execute(&db.pool)
                .await
                .unwrap();

            assert!(matches!(
                db.store.append(LogKey::new(9), None, None).await,
                Err(StoreError::NotFound(_))
            ));
            assert!(db
                .store
                .latest_all(&Predicate::unrestricted())
                .await
                .unwrap()
                .is_empty());
        });
    }
}
