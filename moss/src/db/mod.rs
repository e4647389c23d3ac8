// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The redb-backed persistence layer: [`meta`] (package catalog) and
//! [`state`] (selection history).
//!
//! Each table's value type implements [`Encoding`] explicitly - there is no
//! reflection-driven schema derivation, so a row's on-disk shape is exactly
//! what its `encode`/`decode` pair says it is and nothing else.

pub mod meta;
pub mod state;

use crate::error::{ErrorKind, HasKind};

/// A type that can be stored as a redb table value.
pub trait Encoding: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self, Self::Error>;
}

/// Wraps a `redb` failure with the coarse category a caller can branch on
/// without knowing which table raised it.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transaction: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("table: {0}")]
    Table(#[from] redb::TableError),
    #[error("storage: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("commit: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("corrupt row: {0}")]
    Decode(String),
}

impl HasKind for DbError {
    fn kind(&self) -> ErrorKind {
        match self {
            DbError::Decode(_) => ErrorKind::Corrupt,
            DbError::Commit(_) => ErrorKind::TransactionAborted,
            _ => ErrorKind::IOError,
        }
    }
}
