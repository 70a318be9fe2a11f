// SPDX-License-Identifier: AGPL-3.0-or-later

//! Field-wise comparison of two revisions.
//!
//! Setpoints are compared at display precision, so values which only differ in their formatting
//! (`8.0` and `8.00`) are not reported. Two missing values are equal, a missing and a present
//! value are not.
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Revision;

/// Number of decimal places setpoints are rounded to before comparing them.
pub const DECIMAL_PLACES: i32 = 2;

/// Content fields of a revision which can change between two revisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    /// Lower torque limit.
    TorqueMin,
    /// Torque target value.
    TorqueTarget,
    /// Upper torque limit.
    TorqueMax,
    /// Lower angle limit.
    AngleMin,
    /// Angle target value.
    AngleTarget,
    /// Upper angle limit.
    AngleMax,
    /// Author of the edit.
    Author,
    /// Note attached to the edit.
    Note,
    /// Time the program was last changed on the controller.
    TimeLastChange,
}

impl Field {
    /// All comparable fields.
    pub const ALL: [Field; 9] = [
        Field::TorqueMin,
        Field::TorqueTarget,
        Field::TorqueMax,
        Field::AngleMin,
        Field::AngleTarget,
        Field::AngleMax,
        Field::Author,
        Field::Note,
        Field::TimeLastChange,
    ];

    /// Returns the field name as exposed to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::TorqueMin => "torqueMin",
            Field::TorqueTarget => "torqueTarget",
            Field::TorqueMax => "torqueMax",
            Field::AngleMin => "angleMin",
            Field::AngleTarget => "angleTarget",
            Field::AngleMax => "angleMax",
            Field::Author => "author",
            Field::Note => "note",
            Field::TimeLastChange => "timeLastChange",
        }
    }

    fn value<'a>(&self, revision: &'a Revision) -> Value<'a> {
        let snapshot = &revision.snapshot;

        match self {
            Field::TorqueMin => Value::Number(snapshot.torque_min),
            Field::TorqueTarget => Value::Number(snapshot.torque_target),
            Field::TorqueMax => Value::Number(snapshot.torque_max),
            Field::AngleMin => Value::Number(snapshot.angle_min),
            Field::AngleTarget => Value::Number(snapshot.angle_target),
            Field::AngleMax => Value::Number(snapshot.angle_max),
            Field::Author => Value::Text(revision.author.as_deref()),
            Field::Note => Value::Text(revision.note.as_deref()),
            Field::TimeLastChange => Value::Time(revision.time_last_change),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

enum Value<'a> {
    Number(f64),
    Text(Option<&'a str>),
    Time(Option<DateTime<Utc>>),
}

impl Value<'_> {
    fn is_missing(&self) -> bool {
        match self {
            Value::Number(number) => number.is_nan(),
            Value::Text(text) => text.is_none(),
            Value::Time(time) => time.is_none(),
        }
    }

    fn same_as(&self, other: &Value<'_>) -> bool {
        if self.is_missing() || other.is_missing() {
            return self.is_missing() && other.is_missing();
        }

        match (self, other) {
            (Value::Number(left), Value::Number(right)) => round(*left) == round(*right),
            (Value::Text(left), Value::Text(right)) => left == right,
            (Value::Time(left), Value::Time(right)) => left == right,
            _ => false,
        }
    }
}

/// Scales a setpoint to an integer at display precision.
fn round(value: f64) -> f64 {
    (value * 10_f64.powi(DECIMAL_PLACES)).round()
}

/// Returns the set of fields whose values differ between two revisions.
pub fn diff(left: &Revision, right: &Revision) -> BTreeSet<Field> {
    Field::ALL
        .iter()
        .filter(|field| !field.value(left).same_as(&field.value(right)))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};

    use crate::types::{RevNumber, Revision, Snapshot};

    use super::{diff, Field};

    #[fixture]
    fn revision() -> Revision {
        Revision {
            rev: RevNumber::default(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            author: Some("alice".into()),
            note: None,
            time_last_change: None,
            snapshot: Snapshot {
                torque_min: 5.0,
                torque_target: 6.0,
                torque_max: 7.0,
                angle_min: 10.0,
                angle_target: 20.0,
                angle_max: 30.0,
            },
        }
    }

    #[rstest]
    fn identical_revisions(revision: Revision) {
        assert!(diff(&revision, &revision).is_empty());
    }

    #[rstest]
    fn ignores_identity_fields(revision: Revision) {
        let mut later = revision.clone();
        later.rev = RevNumber::new(4).unwrap();
        later.created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        assert!(diff(&revision, &later).is_empty());
    }

    #[rstest]
    #[case(5.0, 5.00, &[])]
    #[case(5.0, 5.001, &[])]
    #[case(5.0, 5.1, &[Field::TorqueMin])]
    #[case(5.0, 5.01, &[Field::TorqueMin])]
    #[case(f64::NAN, f64::NAN, &[])]
    #[case(f64::NAN, 5.0, &[Field::TorqueMin])]
    fn torque_min_changes(
        revision: Revision,
        #[case] left: f64,
        #[case] right: f64,
        #[case] expected: &[Field],
    ) {
        let mut revision = revision;
        revision.snapshot.torque_min = left;
        let mut other = revision.clone();
        other.snapshot.torque_min = right;

        let expected: BTreeSet<Field> = expected.iter().copied().collect();
        assert_eq!(diff(&revision, &other), expected);
        assert_eq!(diff(&other, &revision), expected);
    }

    #[rstest]
    fn null_versus_value(revision: Revision) {
        let mut other = revision.clone();
        other.author = None;
        other.note = Some("loosened spec".into());
        other.time_last_change = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());

        let changed = diff(&revision, &other);
        assert_eq!(
            changed,
            [Field::Author, Field::Note, Field::TimeLastChange]
                .into_iter()
                .collect::<BTreeSet<Field>>()
        );
    }

    #[test]
    fn field_names() {
        assert_eq!(Field::TorqueMin.to_string(), "torqueMin");
        assert_eq!(
            serde_json::to_string(&Field::TimeLastChange).unwrap(),
            "\"timeLastChange\""
        );
    }
}
