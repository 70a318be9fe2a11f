// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::errors::StoreError;
use crate::db::models::change_log::timestamp;
use crate::types::{LogKey, LogRecord, RevNumber, Revision, Snapshot};

/// Log record with all its revisions as stored in the `pset_ledger` table.
#[derive(FromRow, Debug, Clone)]
pub struct LedgerRow {
    /// Identifier of the log record.
    pub id: i64,

    /// Controller the tool is connected to.
    pub controller_id: String,

    /// Device name.
    pub station: String,

    /// Parameter set on the controller.
    pub pset: String,

    /// Registration time in microseconds.
    pub createdat: i64,

    /// JSON array of [`LedgerEntry`] objects, ordered by revision number.
    pub jsondata: String,
}

impl LedgerRow {
    /// Returns the identity of the log record.
    pub fn record(&self) -> Result<LogRecord, StoreError> {
        let key = self.key();

        Ok(LogRecord {
            key,
            controller_id: self.controller_id.clone(),
            device: self.station.clone(),
            pset: self.pset.clone(),
            created_at: timestamp(key, "createdat", self.createdat)?,
        })
    }

    /// Parses the ledger and checks that revision numbers start at zero without gaps.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let key = self.key();

        let entries: Vec<LedgerEntry> =
            serde_json::from_str(&self.jsondata).map_err(|err| StoreError::Corrupt {
                key,
                reason: err.to_string(),
            })?;

        for (index, entry) in entries.iter().enumerate() {
            if entry.rev != index as i64 {
                return Err(StoreError::Corrupt {
                    key,
                    reason: format!("found revision {} at position {}", entry.rev, index),
                });
            }
        }

        Ok(entries)
    }

    /// Returns all revisions in ascending order.
    pub fn revisions(&self) -> Result<Vec<Revision>, StoreError> {
        let key = self.key();

        self.entries()?
            .into_iter()
            .map(|entry| entry.into_revision(key))
            .collect()
    }

    fn key(&self) -> LogKey {
        LogKey::new(self.id)
    }
}

/// Lower limit, target value and upper limit of a setpoint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Lower limit.
    pub min: f64,

    /// Target value.
    pub target: f64,

    /// Upper limit.
    pub max: f64,
}

/// One revision inside the ledger document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Revision number, equal to the position inside the ledger.
    pub rev: i64,

    /// Author of the revision.
    pub user: Option<String>,

    /// Note attached to the revision.
    pub note: Option<String>,

    /// Time the revision was written.
    pub timestamp: DateTime<Utc>,

    /// Torque setpoints.
    pub torque: Limits,

    /// Angle setpoints.
    pub angle: Limits,

    /// Time the tool program was last changed on the controller.
    #[serde(default)]
    pub time_last_change: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Converts the entry into a revision of the given log record.
    pub fn into_revision(self, key: LogKey) -> Result<Revision, StoreError> {
        let rev = RevNumber::new(self.rev).map_err(|err| StoreError::Corrupt {
            key,
            reason: err.to_string(),
        })?;

        Ok(Revision {
            rev,
            created_at: self.timestamp,
            author: self.user,
            note: self.note,
            time_last_change: self.time_last_change,
            snapshot: Snapshot {
                torque_min: self.torque.min,
                torque_target: self.torque.target,
                torque_max: self.torque.max,
                angle_min: self.angle.min,
                angle_target: self.angle.target,
                angle_max: self.angle.max,
            },
        })
    }
}

impl From<&Revision> for LedgerEntry {
    fn from(revision: &Revision) -> Self {
        let snapshot = &revision.snapshot;

        Self {
            rev: revision.rev.as_i64(),
            user: revision.author.clone(),
            note: revision.note.clone(),
            timestamp: revision.created_at,
            torque: Limits {
                min: snapshot.torque_min,
                target: snapshot.torque_target,
                max: snapshot.torque_max,
            },
            angle: Limits {
                min: snapshot.angle_min,
                target: snapshot.angle_target,
                max: snapshot.angle_max,
            },
            time_last_change: revision.time_last_change,
        }
    }
}
