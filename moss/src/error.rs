// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Shared error taxonomy for the metadata and state subsystem.
//!
//! Individual modules define their own `thiserror` enums with full context
//! (paths, remote IDs, underlying causes); each maps onto one of the kinds
//! here via [`HasKind::kind`] so callers that only care about the coarse
//! category - not the exact variant - can match on [`ErrorKind`] alone.

use std::fmt;

/// Coarse error category, independent of which module raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Key/path absent. Normal for queries, fatal for read-only open.
    NotFound,
    /// Unparseable archive or KV row.
    Corrupt,
    /// Underlying filesystem/KV failure.
    IOError,
    /// Semantic invariant violated (missing hash, zero size, etc).
    MalformedEntry,
    /// A write transaction could not commit.
    TransactionAborted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Corrupt => "corrupt",
            ErrorKind::IOError => "io error",
            ErrorKind::MalformedEntry => "malformed entry",
            ErrorKind::TransactionAborted => "transaction aborted",
        };
        f.write_str(s)
    }
}

/// Implemented by every module-local error enum so callers can collapse
/// detailed variants down to the shared taxonomy.
pub trait HasKind {
    fn kind(&self) -> ErrorKind;
}
