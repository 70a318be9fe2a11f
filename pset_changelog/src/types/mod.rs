// SPDX-License-Identifier: AGPL-3.0-or-later

//! Domain types shared by the store adapters, the filter, the diff and the service.
mod log_key;
mod log_record;
mod rev_number;
mod revision;

pub use log_key::LogKey;
pub use log_record::{LogRecord, NewLogRecord};
pub use rev_number::RevNumber;
pub use revision::{normalize_text, Revision, Snapshot};
