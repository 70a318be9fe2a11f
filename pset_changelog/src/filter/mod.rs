// SPDX-License-Identifier: AGPL-3.0-or-later

//! Resolves the filter selection of the change log overview into one query predicate.
//!
//! The controls of the overview are mutually exclusive shortcuts, not a general filter
//! combinator. A selection is resolved by walking an ordered rule table from top to bottom: the
//! first rule which applies decides the predicate and every other field of the selection is
//! ignored.
//!
//! | # | Rule                    | Predicate                                              |
//! |---|-------------------------|--------------------------------------------------------|
//! | 1 | all time                | none                                                   |
//! | 2 | current & previous week | registered since start of previous week                |
//! | 3 | current week            | registered since start of current week                 |
//! | 4 | previous week           | registered during previous week                        |
//! | 5 | devices & date range    | device in set, registered within range (inclusive)     |
//! | 6 | devices                 | device in set                                          |
//! | 7 | date range              | registered within range (inclusive)                    |
//! | 8 | fallback                | none                                                   |
//!
//! Selecting the [`ALL_DEVICES`] sentinel lifts the device restriction of rules 5 and 6.
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ChangeLogError, Result};
#[cfg(test)]
use crate::types::LogRecord;

mod week;

pub use week::Weeks;

/// Synthetic device entry meaning "no device restriction".
pub const ALL_DEVICES: &str = "All";

/// Number of leading characters of a device name identifying its production line.
const DEVICE_GROUP_PREFIX_LEN: usize = 2;

/// Inclusive time range selected in the overview.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest registration time.
    pub start: DateTime<Utc>,

    /// Latest registration time.
    pub end: DateTime<Utc>,
}

/// Filter selection of the change log overview.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    /// Show everything, ignoring all other fields.
    pub all_time: bool,

    /// Restrict to records registered during the current week.
    pub current_week: bool,

    /// Restrict to records registered during the previous week.
    pub previous_week: bool,

    /// Restrict to these devices, may contain [`ALL_DEVICES`].
    pub devices: BTreeSet<String>,

    /// Restrict to records registered within this range.
    pub date_range: Option<DateRange>,
}

impl FilterSpec {
    /// Selection showing every log record.
    pub fn all_time() -> Self {
        Self {
            all_time: true,
            ..Self::default()
        }
    }
}

/// Upper end of the registration time window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpperBound {
    /// Registered at or before this time.
    Inclusive(DateTime<Utc>),

    /// Registered strictly before this time.
    Exclusive(DateTime<Utc>),
}

/// Condition on log records a filter selection resolved into.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Predicate {
    /// Registered at or after this time.
    pub created_from: Option<DateTime<Utc>>,

    /// Registered before this bound.
    pub created_until: Option<UpperBound>,

    /// Device has to be one of these, `None` for any device.
    pub devices: Option<BTreeSet<String>>,
}

impl Predicate {
    /// Predicate matching every log record.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Returns true when this predicate does not restrict anything.
    pub fn is_unrestricted(&self) -> bool {
        self == &Self::unrestricted()
    }

    /// Returns true if the log record satisfies this predicate, evaluated in memory.
    ///
    /// Stores evaluate predicates in SQL, this mirrors their semantics for assertions.
    #[cfg(test)]
    pub(crate) fn matches(&self, record: &LogRecord) -> bool {
        if let Some(from) = self.created_from {
            if record.created_at < from {
                return false;
            }
        }

        match self.created_until {
            Some(UpperBound::Inclusive(until)) if record.created_at > until => return false,
            Some(UpperBound::Exclusive(until)) if record.created_at >= until => return false,
            _ => (),
        }

        match &self.devices {
            Some(devices) => devices.contains(&record.device),
            None => true,
        }
    }

    fn created_between(range: &DateRange) -> Result<Self> {
        if range.start > range.end {
            return Err(ChangeLogError::Validation(format!(
                "Date range starts after it ends: {} > {}",
                range.start, range.end
            )));
        }

        Ok(Self {
            created_from: Some(range.start),
            created_until: Some(UpperBound::Inclusive(range.end)),
            devices: None,
        })
    }

    fn on_devices(devices: &BTreeSet<String>) -> Self {
        let devices = if devices.contains(ALL_DEVICES) {
            None
        } else {
            Some(devices.clone())
        };

        Self {
            devices,
            ..Self::default()
        }
    }
}

/// One row of the resolution table.
struct Rule {
    name: &'static str,
    applies: fn(&FilterSpec) -> bool,
    predicate: fn(&FilterSpec, &Weeks) -> Result<Predicate>,
}

/// Resolution table, evaluated top to bottom, first match wins.
const RULES: [Rule; 8] = [
    Rule {
        name: "all time",
        applies: |spec| spec.all_time,
        predicate: |_, _| Ok(Predicate::unrestricted()),
    },
    Rule {
        name: "current and previous week",
        applies: |spec| spec.current_week && spec.previous_week,
        predicate: |_, weeks| {
            Ok(Predicate {
                created_from: Some(weeks.previous),
                ..Predicate::default()
            })
        },
    },
    Rule {
        name: "current week",
        applies: |spec| spec.current_week,
        predicate: |_, weeks| {
            Ok(Predicate {
                created_from: Some(weeks.current),
                ..Predicate::default()
            })
        },
    },
    Rule {
        name: "previous week",
        applies: |spec| spec.previous_week,
        predicate: |_, weeks| {
            Ok(Predicate {
                created_from: Some(weeks.previous),
                created_until: Some(UpperBound::Exclusive(weeks.current)),
                devices: None,
            })
        },
    },
    Rule {
        name: "devices and date range",
        applies: |spec| !spec.devices.is_empty() && spec.date_range.is_some(),
        predicate: |spec, _| {
            let range = spec.date_range.as_ref().ok_or_else(missing_date_range)?;

            Ok(Predicate {
                devices: Predicate::on_devices(&spec.devices).devices,
                ..Predicate::created_between(range)?
            })
        },
    },
    Rule {
        name: "devices",
        applies: |spec| !spec.devices.is_empty(),
        predicate: |spec, _| Ok(Predicate::on_devices(&spec.devices)),
    },
    Rule {
        name: "date range",
        applies: |spec| spec.date_range.is_some(),
        predicate: |spec, _| {
            let range = spec.date_range.as_ref().ok_or_else(missing_date_range)?;
            Predicate::created_between(range)
        },
    },
    Rule {
        name: "fallback",
        applies: |_| true,
        predicate: |_, _| Ok(Predicate::unrestricted()),
    },
];

fn missing_date_range() -> ChangeLogError {
    ChangeLogError::Validation("Date range rule applied without a date range".into())
}

/// Resolves a filter selection into a predicate, with week boundaries determined relative to
/// `now`.
pub fn resolve(spec: &FilterSpec, now: DateTime<Utc>) -> Result<Predicate> {
    let weeks = Weeks::containing(now)?;

    // The fallback rule always applies, this can not run off the end of the table
    let rule = RULES
        .iter()
        .find(|rule| (rule.applies)(spec))
        .ok_or_else(|| ChangeLogError::Validation("No filter rule applies".into()))?;

    debug!("Resolved filter selection with rule '{}'", rule.name);
    (rule.predicate)(spec, &weeks)
}

/// Groups device names by the production line prefix of their name, for example "F1-AA 123456"
/// belongs to group "F1".
pub fn device_groups<'a, I>(devices: I) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for device in devices {
        if device == ALL_DEVICES {
            continue;
        }

        let prefix: String = device.chars().take(DEVICE_GROUP_PREFIX_LEN).collect();
        groups.entry(prefix).or_default().push(device.clone());
    }

    groups
}
