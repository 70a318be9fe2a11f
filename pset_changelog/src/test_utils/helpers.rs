// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};

use crate::types::{LogKey, NewLogRecord, Snapshot};

/// Setpoints used for log records created in tests.
fn snapshot() -> Snapshot {
    Snapshot {
        torque_min: 18.5,
        torque_target: 20.0,
        torque_max: 21.5,
        angle_min: 30.0,
        angle_target: 45.0,
        angle_max: 60.0,
    }
}

/// Log record on the given device, registered right now.
pub fn new_record(key: i64, device: &str) -> NewLogRecord {
    NewLogRecord::new(LogKey::new(key), "C1", device, "1", snapshot())
}

/// Log record on the given device, registered at the given time.
pub fn new_record_at(key: i64, device: &str, created_at: DateTime<Utc>) -> NewLogRecord {
    NewLogRecord {
        created_at,
        ..new_record(key, device)
    }
}
