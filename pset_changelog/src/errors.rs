// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::db::errors::StoreError;
use crate::types::LogKey;

/// A specialized `Result` type for the change log service.
pub type Result<T> = anyhow::Result<T, ChangeLogError>;

/// Represents all the ways an operation of the change log service can fail.
#[derive(thiserror::Error, Debug)]
pub enum ChangeLogError {
    /// Append targeted a log record without a base revision.
    #[error("Log record {0} has no base revision")]
    NotFound(LogKey),

    /// Input parameters or filter specification are inconsistent.
    #[error("Invalid params: {0}")]
    Validation(String),

    /// Connectivity, timeout or constraint violation in the persistence layer.
    #[error(transparent)]
    Store(StoreError),

    /// Concurrent appends on the same log record could not be serialized, even after retrying.
    #[error("Append on log record {key} conflicted with concurrent edits {attempts} times")]
    Conflict {
        /// Log record the append was targeting.
        key: LogKey,

        /// Number of attempts made before giving up.
        attempts: u32,
    },
}

impl From<StoreError> for ChangeLogError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::Duplicate(key) => {
                Self::Validation(format!("Log record {} already exists", key))
            }
            StoreError::Invalid(reason) => Self::Validation(reason),
            StoreError::Conflict(key) => Self::Conflict { key, attempts: 1 },
            error => Self::Store(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::db::errors::StoreError;
    use crate::types::LogKey;

    use super::ChangeLogError;

    #[test]
    fn store_errors_map_onto_taxonomy() {
        let key = LogKey::new(42);

        assert!(matches!(
            ChangeLogError::from(StoreError::NotFound(key)),
            ChangeLogError::NotFound(found) if found == key
        ));
        assert!(matches!(
            ChangeLogError::from(StoreError::Duplicate(key)),
            ChangeLogError::Validation(_)
        ));
        assert!(matches!(
            ChangeLogError::from(StoreError::Timeout(Duration::from_millis(10))),
            ChangeLogError::Store(StoreError::Timeout(_))
        ));
        assert!(matches!(
            ChangeLogError::from(StoreError::Conflict(key)),
            ChangeLogError::Conflict { attempts: 1, .. }
        ));
    }
}
