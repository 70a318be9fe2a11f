// SPDX-License-Identifier: AGPL-3.0-or-later

//! Structs representing rows in SQL tables. Needed when coercing results returned from a
//! query using the `sqlx` library.
mod change_log;
mod ledger;
pub mod utils;

pub use change_log::{ChangeLogRow, LogRecordRow};
pub use ledger::{LedgerEntry, LedgerRow, Limits};
