// SPDX-License-Identifier: AGPL-3.0-or-later

//! Implementations of the `RevisionStore` trait for both physical encodings.
use sqlx::any::{Any, AnyArguments};
use sqlx::query::QueryAs;

use crate::db::models::utils::to_micros;
use crate::filter::{Predicate, UpperBound, ALL_DEVICES};

mod ledger;
mod normalized;

pub use ledger::LedgerStore;
pub use normalized::NormalizedStore;

/// Value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Int(i64),
    Text(String),
}

/// `WHERE` clause of a query, translated from a [`Predicate`].
///
/// Placeholders are numbered from `$1`, the clause is meant to be the only source of bound
/// values of the query it is used in.
#[derive(Debug, Default)]
pub(crate) struct SqlFilter {
    conditions: Vec<String>,
    values: Vec<BindValue>,
}

impl SqlFilter {
    /// Translates the predicate for a table with the given registration time and device
    /// columns.
    pub fn new(predicate: &Predicate, created_column: &str, device_column: &str) -> Self {
        let mut filter = Self::default();
        if predicate.is_unrestricted() {
            return filter;
        }

        if let Some(from) = predicate.created_from {
            let placeholder = filter.push(BindValue::Int(to_micros(&from)));
            filter
                .conditions
                .push(format!("{} >= {}", created_column, placeholder));
        }

        match predicate.created_until {
            Some(UpperBound::Inclusive(until)) => {
                let placeholder = filter.push(BindValue::Int(to_micros(&until)));
                filter
                    .conditions
                    .push(format!("{} <= {}", created_column, placeholder));
            }
            Some(UpperBound::Exclusive(until)) => {
                let placeholder = filter.push(BindValue::Int(to_micros(&until)));
                filter
                    .conditions
                    .push(format!("{} < {}", created_column, placeholder));
            }
            None => (),
        }

        if let Some(devices) = &predicate.devices {
            if devices.is_empty() {
                filter.conditions.push("1 = 0".into());
            } else {
                let placeholders: Vec<String> = devices
                    .iter()
                    .map(|device| filter.push(BindValue::Text(device.clone())))
                    .collect();

                filter.conditions.push(format!(
                    "{} IN ({})",
                    device_column,
                    placeholders.join(", ")
                ));
            }
        }

        filter
    }

    /// Returns the clause including the `WHERE` keyword, empty when nothing is restricted.
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }

        format!("WHERE {}", self.conditions.join(" AND "))
    }

    /// Binds all values of this clause to the query.
    pub fn bind<'q, O>(
        self,
        query: QueryAs<'q, Any, O, AnyArguments<'q>>,
    ) -> QueryAs<'q, Any, O, AnyArguments<'q>> {
        self.values
            .into_iter()
            .fold(query, |query, value| match value {
                BindValue::Int(value) => query.bind(value),
                BindValue::Text(value) => query.bind(value),
            })
    }

    fn push(&mut self, value: BindValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

/// Prepends the "no device restriction" sentinel to a list of device names.
pub(crate) fn with_all_devices(devices: Vec<String>) -> Vec<String> {
    std::iter::once(ALL_DEVICES.to_owned())
        .chain(devices.into_iter().filter(|device| device != ALL_DEVICES))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};

    use crate::db::models::utils::to_micros;
    use crate::filter::{Predicate, UpperBound};

    use super::{with_all_devices, BindValue, SqlFilter};

    #[test]
    fn unrestricted_predicate() {
        let filter = SqlFilter::new(&Predicate::unrestricted(), "createdat", "device");
        assert_eq!(filter.sql(), "");
        assert!(filter.values.is_empty());
    }

    #[test]
    fn numbered_placeholders() {
        let from = Utc.with_ymd_and_hms(2024, 2, 26, 0, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();

        let predicate = Predicate {
            created_from: Some(from),
            created_until: Some(UpperBound::Exclusive(until)),
            devices: Some(["D2", "D1"].iter().map(|d| d.to_string()).collect()),
        };

        let filter = SqlFilter::new(&predicate, "createdat", "station");
        assert_eq!(
            filter.sql(),
            "WHERE createdat >= $1 AND createdat < $2 AND station IN ($3, $4)"
        );
        assert_eq!(
            filter.values,
            vec![
                BindValue::Int(to_micros(&from)),
                BindValue::Int(to_micros(&until)),
                BindValue::Text("D1".into()),
                BindValue::Text("D2".into()),
            ]
        );
    }

    #[test]
    fn empty_device_set_matches_nothing() {
        let predicate = Predicate {
            devices: Some(BTreeSet::new()),
            ..Predicate::default()
        };

        let filter = SqlFilter::new(&predicate, "createdat", "device");
        assert_eq!(filter.sql(), "WHERE 1 = 0");
    }

    #[test]
    fn prepend_sentinel() {
        assert_eq!(
            with_all_devices(vec!["D1".into(), "D2".into()]),
            vec!["All", "D1", "D2"]
        );
        assert_eq!(with_all_devices(vec![]), vec!["All"]);
    }
}
