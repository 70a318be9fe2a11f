// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::errors::StoreError;
use crate::db::models::utils::from_micros;
use crate::types::{LogKey, LogRecord, RevNumber, Revision, Snapshot};

/// Identity of a log record as stored in the `pset_log_records` table.
#[derive(FromRow, Debug, Clone)]
pub struct LogRecordRow {
    /// Identifier of the log record.
    pub log_id: i64,

    /// Controller the tool is connected to.
    pub controller_id: String,

    /// Device (station) name.
    pub device: String,

    /// Parameter set on the controller.
    pub pset: String,

    /// Registration time in microseconds.
    pub createdat: i64,
}

impl LogRecordRow {
    /// Converts the row into a log record.
    pub fn into_record(self) -> Result<LogRecord, StoreError> {
        let key = LogKey::new(self.log_id);

        Ok(LogRecord {
            key,
            controller_id: self.controller_id,
            device: self.device,
            pset: self.pset,
            created_at: timestamp(key, "createdat", self.createdat)?,
        })
    }
}

/// One revision as stored in the `pset_change_log` table.
///
/// Every row repeats the identity of its log record next to the revision.
#[derive(FromRow, Debug, Clone)]
pub struct ChangeLogRow {
    /// Identifier of the log record.
    pub log_id: i64,

    /// Controller the tool is connected to.
    pub controller_id: String,

    /// Device (station) name.
    pub device: String,

    /// Parameter set on the controller.
    pub pset: String,

    /// Time the tool program was last changed on the controller in microseconds.
    pub time_last_change: Option<i64>,

    /// Revision number.
    pub rev: i64,

    /// Time the revision was written in microseconds.
    pub rev_time: i64,

    /// Author of the revision.
    pub user: Option<String>,

    /// Note attached to the revision.
    pub note: Option<String>,

    /// Registration time of the log record in microseconds.
    pub createdat: i64,

    /// Lower torque limit.
    pub torque_min: f64,

    /// Torque target value.
    pub torque_target: f64,

    /// Upper torque limit.
    pub torque_max: f64,

    /// Lower angle limit.
    pub angle_min: f64,

    /// Angle target value.
    pub angle_target: f64,

    /// Upper angle limit.
    pub angle_max: f64,
}

impl ChangeLogRow {
    /// Splits the row into the log record identity and the revision it holds.
    pub fn into_parts(self) -> Result<(LogRecord, Revision), StoreError> {
        let key = LogKey::new(self.log_id);

        let rev = RevNumber::new(self.rev).map_err(|err| StoreError::Corrupt {
            key,
            reason: err.to_string(),
        })?;

        let time_last_change = match self.time_last_change {
            Some(micros) => Some(timestamp(key, "time_last_change", micros)?),
            None => None,
        };

        let revision = Revision {
            rev,
            created_at: timestamp(key, "rev_time", self.rev_time)?,
            author: self.user,
            note: self.note,
            time_last_change,
            snapshot: Snapshot {
                torque_min: self.torque_min,
                torque_target: self.torque_target,
                torque_max: self.torque_max,
                angle_min: self.angle_min,
                angle_target: self.angle_target,
                angle_max: self.angle_max,
            },
        };

        let record = LogRecord {
            key,
            controller_id: self.controller_id,
            device: self.device,
            pset: self.pset,
            created_at: timestamp(key, "createdat", self.createdat)?,
        };

        Ok((record, revision))
    }

    /// Converts the row into the revision it holds.
    pub fn into_revision(self) -> Result<Revision, StoreError> {
        self.into_parts().map(|(_, revision)| revision)
    }
}

pub(crate) fn timestamp(
    key: LogKey,
    column: &str,
    micros: i64,
) -> Result<DateTime<Utc>, StoreError> {
    from_micros(micros).ok_or_else(|| StoreError::Corrupt {
        key,
        reason: format!("`{}` out of range: {}", column, micros),
    })
}
