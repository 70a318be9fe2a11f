// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::errors::{ChangeLogError, Result};

/// Calendar week boundaries relative to a point in time.
///
/// Weeks start on Monday at midnight UTC, for the current and the previous week alike.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Weeks {
    /// Start of the week `now` falls into.
    pub current: DateTime<Utc>,

    /// Start of the week before.
    pub previous: DateTime<Utc>,
}

impl Weeks {
    /// Determines the week boundaries around `now`.
    pub fn containing(now: DateTime<Utc>) -> Result<Self> {
        let days_since_monday = i64::from(now.weekday().num_days_from_monday());
        let monday = now.date_naive() - Duration::days(days_since_monday);

        let midnight = monday.and_hms_opt(0, 0, 0).ok_or_else(|| {
            ChangeLogError::Validation(format!("Can't determine week start of {}", now))
        })?;
        let current = Utc.from_utc_datetime(&midnight);

        Ok(Self {
            current,
            previous: current - Duration::weeks(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    use super::Weeks;

    #[rstest]
    // Monday morning
    #[case(Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap())]
    // Wednesday noon
    #[case(Utc.with_ymd_and_hms(2024, 3, 6, 12, 30, 0).unwrap())]
    // Sunday night
    #[case(Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap())]
    fn week_of_march_fourth(#[case] now: chrono::DateTime<Utc>) {
        let weeks = Weeks::containing(now).unwrap();
        assert_eq!(weeks.current, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(weeks.previous, Utc.with_ymd_and_hms(2024, 2, 26, 0, 0, 0).unwrap());
    }

    #[test]
    fn across_year_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let weeks = Weeks::containing(now).unwrap();
        assert_eq!(weeks.current, Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap());
        assert_eq!(weeks.previous, Utc.with_ymd_and_hms(2024, 12, 23, 0, 0, 0).unwrap());
    }
}
