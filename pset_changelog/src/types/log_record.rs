// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ChangeLogError, Result};
use crate::types::{normalize_text, LogKey, Snapshot};

/// Identity of one physical tool program: a PSET running on a device behind a controller.
///
/// A log record never changes after it got created, only revisions get appended under it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Identifier of this log record.
    pub key: LogKey,

    /// Controller the tool is connected to.
    pub controller_id: String,

    /// Device (station) name.
    pub device: String,

    /// Parameter set number or name on the controller.
    pub pset: String,

    /// Time this tool program was registered.
    pub created_at: DateTime<Utc>,
}

/// Everything needed to create a log record together with its base revision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogRecord {
    /// Identifier of the new log record.
    pub key: LogKey,

    /// Controller the tool is connected to.
    pub controller_id: String,

    /// Device (station) name.
    pub device: String,

    /// Parameter set number or name on the controller.
    pub pset: String,

    /// Time this tool program was registered.
    pub created_at: DateTime<Utc>,

    /// Time the tool program was last changed on the controller, if known.
    pub time_last_change: Option<DateTime<Utc>>,

    /// Author of the base revision.
    pub author: Option<String>,

    /// Note of the base revision.
    pub note: Option<String>,

    /// Setpoints of the base revision.
    pub snapshot: Snapshot,
}

impl NewLogRecord {
    /// Returns a new log record registered right now, without author, note or
    /// `time_last_change`.
    pub fn new(
        key: LogKey,
        controller_id: &str,
        device: &str,
        pset: &str,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            key,
            controller_id: controller_id.to_owned(),
            device: device.to_owned(),
            pset: pset.to_owned(),
            created_at: Utc::now(),
            time_last_change: None,
            author: None,
            note: None,
            snapshot,
        }
    }

    /// Checks identity fields and setpoints and normalizes author and note.
    pub fn validate(mut self) -> Result<Self> {
        if self.device.trim().is_empty() {
            return Err(ChangeLogError::Validation("`device` can't be empty".into()));
        }

        if self.pset.trim().is_empty() {
            return Err(ChangeLogError::Validation("`pset` can't be empty".into()));
        }

        if let Some(name) = self.snapshot.first_non_finite() {
            return Err(ChangeLogError::Validation(format!(
                "`{}` has to be a finite number",
                name
            )));
        }

        self.author = normalize_text(self.author.as_deref());
        self.note = normalize_text(self.note.as_deref());

        Ok(self)
    }

    /// Returns the identity part of this log record.
    pub fn record(&self) -> LogRecord {
        LogRecord {
            key: self.key,
            controller_id: self.controller_id.clone(),
            device: self.device.clone(),
            pset: self.pset.clone(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{LogKey, Snapshot};

    use super::NewLogRecord;

    fn snapshot() -> Snapshot {
        Snapshot {
            torque_min: 1.0,
            torque_target: 2.0,
            torque_max: 3.0,
            angle_min: 4.0,
            angle_target: 5.0,
            angle_max: 6.0,
        }
    }

    #[test]
    fn validate() {
        let record = NewLogRecord::new(LogKey::new(1), "C1", "F1-AA 123456", "7", snapshot());
        assert!(record.clone().validate().is_ok());

        let mut no_device = record.clone();
        no_device.device = " ".into();
        assert!(no_device.validate().is_err());

        let mut infinite = record.clone();
        infinite.snapshot.torque_max = f64::INFINITY;
        assert!(infinite.validate().is_err());
    }

    #[test]
    fn normalizes_author_and_note() {
        let mut record = NewLogRecord::new(LogKey::new(1), "C1", "F1", "7", snapshot());
        record.author = Some("  ".into());
        record.note = Some(" imported ".into());

        let record = record.validate().unwrap();
        assert_eq!(record.author, None);
        assert_eq!(record.note.as_deref(), Some("imported"));
    }
}
