// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a log record, the synthetic integer id of one controller / device / PSET
/// combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogKey(i64);

impl LogKey {
    /// Returns a new log key.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the integer representation used in the database.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for LogKey {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for LogKey {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(value.trim().parse()?))
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::LogKey;

    #[test]
    fn parse_from_str() {
        assert_eq!(" 42 ".parse::<LogKey>().unwrap(), LogKey::new(42));
        assert!("forty-two".parse::<LogKey>().is_err());
    }

    #[test]
    fn ordering() {
        let mut keys = vec![LogKey::new(7), LogKey::new(-1), LogKey::new(3)];
        keys.sort();
        assert_eq!(keys, vec![LogKey::new(-1), LogKey::new(3), LogKey::new(7)]);
    }
}
