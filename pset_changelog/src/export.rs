// SPDX-License-Identifier: AGPL-3.0-or-later

//! Flattened display rows and labelled tables handed to user interfaces and exporters.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{LogKey, LogRecord, RevNumber, Revision};

/// Format of timestamps in exported tables.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Log record identity and one of its revisions, flattened into a single row.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Identifier of the log record.
    pub key: LogKey,

    /// Controller the tool is connected to.
    pub controller_id: String,

    /// Device (station) name.
    pub device: String,

    /// Parameter set on the controller.
    pub pset: String,

    /// Time the tool program was last changed on the controller.
    pub time_last_change: Option<DateTime<Utc>>,

    /// Revision number.
    pub rev: RevNumber,

    /// Time the revision was written.
    pub rev_time: DateTime<Utc>,

    /// Author of the revision.
    pub author: Option<String>,

    /// Note attached to the revision.
    pub note: Option<String>,

    /// Registration time of the log record.
    pub created_at: DateTime<Utc>,

    /// Upper torque limit.
    pub torque_max: f64,

    /// Torque target value.
    pub torque_target: f64,

    /// Lower torque limit.
    pub torque_min: f64,

    /// Upper angle limit.
    pub angle_max: f64,

    /// Angle target value.
    pub angle_target: f64,

    /// Lower angle limit.
    pub angle_min: f64,
}

impl Row {
    /// Flattens a log record and one of its revisions.
    pub fn new(record: &LogRecord, revision: &Revision) -> Self {
        let snapshot = &revision.snapshot;

        Self {
            key: record.key,
            controller_id: record.controller_id.clone(),
            device: record.device.clone(),
            pset: record.pset.clone(),
            time_last_change: revision.time_last_change,
            rev: revision.rev,
            rev_time: revision.created_at,
            author: revision.author.clone(),
            note: revision.note.clone(),
            created_at: record.created_at,
            torque_max: snapshot.torque_max,
            torque_target: snapshot.torque_target,
            torque_min: snapshot.torque_min,
            angle_max: snapshot.angle_max,
            angle_target: snapshot.angle_target,
            angle_min: snapshot.angle_min,
        }
    }

    fn cell(&self, column: Column) -> String {
        match column {
            Column::LogId => self.key.to_string(),
            Column::ControllerId => self.controller_id.clone(),
            Column::Device => self.device.clone(),
            Column::Pset => self.pset.clone(),
            Column::TimeLastChange => format_time(self.time_last_change.as_ref()),
            Column::Rev => self.rev.to_string(),
            Column::RevTime => format_time(Some(&self.rev_time)),
            Column::User => self.author.clone().unwrap_or_default(),
            Column::Note => self.note.clone().unwrap_or_default(),
            Column::CreatedAt => format_time(Some(&self.created_at)),
            Column::TorqueMax => format_number(self.torque_max),
            Column::TorqueTarget => format_number(self.torque_target),
            Column::TorqueMin => format_number(self.torque_min),
            Column::AngleMax => format_number(self.angle_max),
            Column::AngleTarget => format_number(self.angle_target),
            Column::AngleMin => format_number(self.angle_min),
        }
    }
}

/// Columns of an exported table in display order.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    LogId,
    ControllerId,
    Device,
    Pset,
    TimeLastChange,
    Rev,
    RevTime,
    User,
    Note,
    CreatedAt,
    TorqueMax,
    TorqueTarget,
    TorqueMin,
    AngleMax,
    AngleTarget,
    AngleMin,
}

impl Column {
    /// All columns in display order.
    pub const ALL: [Column; 16] = [
        Column::LogId,
        Column::ControllerId,
        Column::Device,
        Column::Pset,
        Column::TimeLastChange,
        Column::Rev,
        Column::RevTime,
        Column::User,
        Column::Note,
        Column::CreatedAt,
        Column::TorqueMax,
        Column::TorqueTarget,
        Column::TorqueMin,
        Column::AngleMax,
        Column::AngleTarget,
        Column::AngleMin,
    ];

    /// Machine readable column name, as stored in the change log table.
    pub fn key(&self) -> &'static str {
        match self {
            Column::LogId => "log_id",
            Column::ControllerId => "controller_id",
            Column::Device => "device",
            Column::Pset => "pset",
            Column::TimeLastChange => "time_last_change",
            Column::Rev => "rev",
            Column::RevTime => "rev_time",
            Column::User => "user",
            Column::Note => "note",
            Column::CreatedAt => "createdat",
            Column::TorqueMax => "torque_max",
            Column::TorqueTarget => "torque_target",
            Column::TorqueMin => "torque_min",
            Column::AngleMax => "angle_max",
            Column::AngleTarget => "angle_target",
            Column::AngleMin => "angle_min",
        }
    }

    /// Human readable column header.
    pub fn label(&self) -> &'static str {
        match self {
            Column::LogId => "Log ID",
            Column::ControllerId => "Controller ID",
            Column::Device => "Device",
            Column::Pset => "PSET",
            Column::TimeLastChange => "Time Last Change",
            Column::Rev => "Rev",
            Column::RevTime => "Revision Time",
            Column::User => "User",
            Column::Note => "Note",
            Column::CreatedAt => "Registered Time",
            Column::TorqueMax => "Torque Max",
            Column::TorqueTarget => "Torque Target",
            Column::TorqueMin => "Torque Min",
            Column::AngleMax => "Angle Max",
            Column::AngleTarget => "Angle Target",
            Column::AngleMin => "Angle Min",
        }
    }
}

/// Rows rendered as text cells below a header of column labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    /// Machine readable column names, in the same order as `columns`.
    pub keys: Vec<String>,

    /// Column labels.
    pub columns: Vec<String>,

    /// Cells of every row, in column order.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Renders the rows with all columns in display order.
    pub fn from_rows(rows: &[Row]) -> Self {
        Self {
            keys: Column::ALL
                .iter()
                .map(|column| column.key().to_owned())
                .collect(),
            columns: Column::ALL
                .iter()
                .map(|column| column.label().to_owned())
                .collect(),
            rows: rows
                .iter()
                .map(|row| Column::ALL.iter().map(|column| row.cell(*column)).collect())
                .collect(),
        }
    }

    /// Returns true when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn format_time(time: Option<&DateTime<Utc>>) -> String {
    time.map(|time| time.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }

    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::types::{LogKey, LogRecord, RevNumber, Revision, Snapshot};

    use super::{Column, Row, Table};

    fn row() -> Row {
        let record = LogRecord {
            key: LogKey::new(42),
            controller_id: "C7".into(),
            device: "F1-AA 123456".into(),
            pset: "12".into(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap(),
        };

        let revision = Revision {
            rev: RevNumber::new(1).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 15, 16).unwrap(),
            author: Some("alice".into()),
            note: None,
            time_last_change: None,
            snapshot: Snapshot {
                torque_min: 5.0,
                torque_target: 6.126,
                torque_max: 7.0,
                angle_min: 10.0,
                angle_target: 20.0,
                angle_max: 30.0,
            },
        };

        Row::new(&record, &revision)
    }

    #[test]
    fn stable_column_order() {
        let table = Table::from_rows(&[]);
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), Column::ALL.len());
        assert_eq!(table.columns[0], "Log ID");
        assert_eq!(table.columns[3], "PSET");
        assert_eq!(table.columns[9], "Registered Time");
        assert_eq!(table.columns[15], "Angle Min");
    }

    #[test]
    fn format_cells() {
        let table = Table::from_rows(&[row()]);
        let cells = &table.rows[0];

        assert_eq!(cells[0], "42");
        assert_eq!(cells[4], "");
        assert_eq!(cells[5], "1");
        assert_eq!(cells[6], "2024-03-05 14:15:16");
        assert_eq!(cells[7], "alice");
        assert_eq!(cells[8], "");
        assert_eq!(cells[9], "2024-03-04 06:00:00");
        assert_eq!(cells[10], "7.00");
        assert_eq!(cells[11], "6.13");
    }

    #[test]
    fn column_keys() {
        let table = Table::from_rows(&[row()]);
        assert_eq!(table.keys.len(), table.columns.len());
        assert_eq!(table.keys[..4], ["log_id", "controller_id", "device", "pset"]);
        assert_eq!(table.keys[7], "user");
        assert_eq!(table.keys[9], "createdat");
        assert_eq!(Column::AngleMin.key(), "angle_min");
    }
}
