// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::RevNumber;

/// Torque and angle setpoints of a PSET at one point in its history.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
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

impl Snapshot {
    /// Returns the names and values of all setpoints.
    pub fn values(&self) -> [(&'static str, f64); 6] {
        [
            ("torqueMin", self.torque_min),
            ("torqueTarget", self.torque_target),
            ("torqueMax", self.torque_max),
            ("angleMin", self.angle_min),
            ("angleTarget", self.angle_target),
            ("angleMax", self.angle_max),
        ]
    }

    /// Returns the name of the first setpoint which is not a finite number.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.values()
            .iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| *name)
    }
}

/// One immutable historical snapshot of a log record plus its audit metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Position of this revision in the history of its log record.
    pub rev: RevNumber,

    /// Server time when this revision was written.
    pub created_at: DateTime<Utc>,

    /// Who made the edit, trimmed, `None` when left blank.
    pub author: Option<String>,

    /// Why the edit was made, trimmed, `None` when left blank.
    pub note: Option<String>,

    /// Time the tool program was last changed on the controller. Carried forward unchanged from
    /// the previous revision.
    pub time_last_change: Option<DateTime<Utc>>,

    /// Parameter values of this revision.
    pub snapshot: Snapshot,
}

impl Revision {
    /// Returns the revision following this one, carrying the setpoints and `time_last_change`
    /// forward and replacing author and note.
    ///
    /// The timestamp never moves backwards, even when the server clock does.
    pub fn successor(
        &self,
        created_at: DateTime<Utc>,
        author: Option<&str>,
        note: Option<&str>,
    ) -> Self {
        Self {
            rev: self.rev.next(),
            created_at: created_at.max(self.created_at),
            author: normalize_text(author),
            note: normalize_text(note),
            time_last_change: self.time_last_change,
            snapshot: self.snapshot,
        }
    }
}

/// Trims user supplied text and maps blank values to `None`.
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::types::RevNumber;

    use super::{normalize_text, Revision, Snapshot};

    fn snapshot() -> Snapshot {
        Snapshot {
            torque_min: 5.0,
            torque_target: 6.0,
            torque_max: 7.0,
            angle_min: 10.0,
            angle_target: 20.0,
            angle_max: 30.0,
        }
    }

    #[test]
    fn normalize_user_text() {
        assert_eq!(normalize_text(None), None);
        assert_eq!(normalize_text(Some("")), None);
        assert_eq!(normalize_text(Some("   \n")), None);
        assert_eq!(normalize_text(Some("  alice ")), Some("alice".to_owned()));
    }

    #[test]
    fn successor_carries_values_forward() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        let time_last_change = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();

        let base = Revision {
            rev: RevNumber::default(),
            created_at,
            author: Some("bob".into()),
            note: Some("initial".into()),
            time_last_change: Some(time_last_change),
            snapshot: snapshot(),
        };

        let next = base.successor(created_at + Duration::hours(1), Some(" alice "), Some(""));
        assert_eq!(next.rev, RevNumber::new(1).unwrap());
        assert_eq!(next.author.as_deref(), Some("alice"));
        assert_eq!(next.note, None);
        assert_eq!(next.snapshot, base.snapshot);
        assert_eq!(next.time_last_change, Some(time_last_change));
        assert_eq!(next.created_at, created_at + Duration::hours(1));

        // Clock moved backwards
        let next = base.successor(created_at - Duration::hours(1), None, None);
        assert_eq!(next.created_at, created_at);
    }

    #[test]
    fn detect_non_finite_setpoints() {
        assert_eq!(snapshot().first_non_finite(), None);

        let mut broken = snapshot();
        broken.angle_target = f64::NAN;
        assert_eq!(broken.first_non_finite(), Some("angleTarget"));
    }
}
