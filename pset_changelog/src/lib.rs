// SPDX-License-Identifier: AGPL-3.0-or-later

//! # pset_changelog
//!
//! Revision engine for PSET (tool parameter set) change logs. Every log record owns an
//! append-only sequence of revisions, numbered from zero without gaps. Operators review the latest
//! revision of each record, inspect and compare the history of one record and amend it by
//! appending new revisions carrying an author and a note.
//!
//! Two physical encodings are supported behind the same [`RevisionStore`] interface: one row per
//! revision in a normalized table, or one row per record holding a JSON ledger of revisions. The
//! [`ChangeLogService`] is the surface external callers (user interfaces, exporters) talk to.
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

mod config;
pub mod db;
pub mod diff;
mod errors;
pub mod export;
pub mod filter;
mod service;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use crate::config::Configuration;
pub use crate::db::{LedgerStore, NormalizedStore, RevisionStore, StoreEncoding};
pub use crate::errors::{ChangeLogError, Result};
pub use crate::service::ChangeLogService;
