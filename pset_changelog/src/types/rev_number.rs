// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ChangeLogError, Result};

/// Revision numbers of a log record start counting from here.
pub const FIRST_REV_NUMBER: i64 = 0;

/// Position of a revision inside the history of its log record.
///
/// Revision numbers are non-negative, start at zero and increase by exactly one with every
/// appended revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevNumber(i64);

impl RevNumber {
    /// Validates and returns a new revision number when correct.
    pub fn new(value: i64) -> Result<Self> {
        if value < FIRST_REV_NUMBER {
            return Err(ChangeLogError::Validation(format!(
                "Revision number can't be negative: {}",
                value
            )));
        }

        Ok(Self(value))
    }

    /// Returns the revision number following this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns true when this is the base revision of a log record.
    pub fn is_first(&self) -> bool {
        self.0 == FIRST_REV_NUMBER
    }

    /// Returns the integer representation used in the database.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Default for RevNumber {
    fn default() -> Self {
        Self(FIRST_REV_NUMBER)
    }
}

impl fmt::Display for RevNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::RevNumber;

    #[test]
    fn validate() {
        assert!(RevNumber::new(-1).is_err());
        assert!(RevNumber::new(0).is_ok());
        assert!(RevNumber::new(100).is_ok());
    }

    #[test]
    fn next_rev_number() {
        let rev = RevNumber::default();
        assert!(rev.is_first());
        assert_eq!(rev.next(), RevNumber::new(1).unwrap());
        assert!(!rev.next().is_first());
    }
}
