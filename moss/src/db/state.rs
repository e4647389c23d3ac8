// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! StateDB: an append-only log of installation states and, per state, the
//! set of selected packages. State IDs are never recycled; rolling back
//! creates a new state whose selections mirror a prior one.

use std::{fmt, path::Path};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use log::trace;
use redb::{ReadableTable, TableDefinition};

use crate::{
    db::DbError,
    error::{ErrorKind, HasKind},
};

const STATES: TableDefinition<u64, &[u8]> = TableDefinition::new("states");
const SELECTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("selections");

/// Monotonic state identifier; never reused, never decreases.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u64);

impl From<u64> for StateId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StateType {
    Transaction,
    Snapshot,
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub id: StateId,
    pub name: String,
    pub description: String,
    pub kind: StateType,
    pub timestamp: DateTime<Utc>,
}

/// Whether a selection came from a built source recipe or a prebuilt binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    Source = 0,
    Binary = 1,
}

impl SelectionType {
    fn from_u8(value: u8) -> Result<Self, StateDbError> {
        match value {
            0 => Ok(SelectionType::Source),
            1 => Ok(SelectionType::Binary),
            other => Err(StateDbError::Corrupt(format!("unknown selection type byte {other}"))),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SelectionFlags: u32 {
        const DEFAULT_POLICY = 0b0000_0001;
        const USER_INSTALLED = 0b0000_0010;
        const DEP_INSTALLED  = 0b0000_0100;
        const HOLD           = 0b0000_1000;
        const PREFER_SOURCE  = 0b0001_0000;
    }
}

/// One selection within a state; `(state_id, identifier)` is the composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub state_id: StateId,
    pub identifier: String,
    pub kind: SelectionType,
    pub flags: SelectionFlags,
}

impl StateEntry {
    fn to_binary(&self) -> StateEntryBinary {
        StateEntryBinary {
            state_id: self.state_id,
            kind: self.kind,
            flags: self.flags,
            identifier: self.identifier.clone(),
        }
    }
}

/// The fixed 16-byte-header wire format `selections` values are stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntryBinary {
    pub state_id: StateId,
    pub flags: SelectionFlags,
    pub kind: SelectionType,
    pub identifier: String,
}

impl StateEntryBinary {
    pub fn encode(&self) -> Vec<u8> {
        let mut id_bytes = self.identifier.clone().into_bytes();
        id_bytes.push(0);

        let mut out = Vec::with_capacity(16 + id_bytes.len());
        out.extend_from_slice(&self.state_id.0.to_be_bytes());
        out.extend_from_slice(&(id_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.flags.bits().to_be_bytes());
        out.push(self.kind as u8);
        out.push(0); // reserved
        out.extend_from_slice(&id_bytes);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateDbError> {
        if bytes.len() < 16 {
            return Err(StateDbError::Corrupt("selection entry shorter than header".into()));
        }

        let state_id = StateId(u64::from_be_bytes(bytes[0..8].try_into().unwrap()));
        let id_len = u16::from_be_bytes(bytes[8..10].try_into().unwrap()) as usize;
        let flags = SelectionFlags::from_bits_truncate(u32::from_be_bytes(bytes[10..14].try_into().unwrap()));
        let kind = SelectionType::from_u8(bytes[14])?;
        // byte 15 is reserved, ignored on read

        let id_bytes = bytes
            .get(16..16 + id_len)
            .ok_or_else(|| StateDbError::Corrupt("selection entry truncated identifier".into()))?;

        let identifier = id_bytes
            .split_last()
            .filter(|(&nul, _)| nul == 0)
            .map(|(_, rest)| rest)
            .ok_or_else(|| StateDbError::Corrupt("selection entry identifier not NUL-terminated".into()))?;

        let identifier = String::from_utf8(identifier.to_vec())
            .map_err(|e| StateDbError::Corrupt(format!("selection identifier not utf8: {e}")))?;

        Ok(Self {
            state_id,
            flags,
            kind,
            identifier,
        })
    }
}

impl From<StateEntryBinary> for StateEntry {
    fn from(b: StateEntryBinary) -> Self {
        Self {
            state_id: b.state_id,
            identifier: b.identifier,
            kind: b.kind,
            flags: b.flags,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateDbError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("corrupt state entry: {0}")]
    Corrupt(String),
}

impl HasKind for StateDbError {
    fn kind(&self) -> ErrorKind {
        match self {
            StateDbError::Db(e) => e.kind(),
            StateDbError::Corrupt(_) => ErrorKind::Corrupt,
        }
    }
}

fn selection_key(state_id: StateId, identifier: &str) -> Vec<u8> {
    let mut key = state_id.0.to_be_bytes().to_vec();
    key.extend_from_slice(identifier.as_bytes());
    key
}

#[derive(Debug)]
pub struct StateDB {
    db: redb::Database,
}

impl StateDB {
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, StateDbError> {
        let path = path.as_ref();
        trace!("opening state db at {path:?}");

        let db = redb::Database::create(path).map_err(DbError::from)?;

        {
            let write = db.begin_write().map_err(DbError::from)?;
            write.open_table(STATES).map_err(DbError::from)?;
            write.open_table(SELECTIONS).map_err(DbError::from)?;
            write.commit().map_err(DbError::from)?;
        }

        Ok(Self { db })
    }

    /// Allocates `max(existing) + 1` and persists the record and its initial
    /// entries in one write transaction.
    pub fn new_state(
        &self,
        name: &str,
        description: &str,
        kind: StateType,
        timestamp: DateTime<Utc>,
        entries: impl IntoIterator<Item = (String, SelectionType, SelectionFlags)>,
    ) -> Result<StateId, StateDbError> {
        let write = self.db.begin_write().map_err(DbError::from)?;

        let id = {
            let mut states = write.open_table(STATES).map_err(DbError::from)?;
            let next = states
                .iter()
                .map_err(DbError::from)?
                .next_back()
                .transpose()
                .map_err(DbError::from)?
                .map(|(k, _)| k.value() + 1)
                .unwrap_or(1);

            let record = StateRecord {
                id: StateId(next),
                name: name.to_string(),
                description: description.to_string(),
                kind,
                timestamp,
            };
            states.insert(next, encode_record(&record).as_slice()).map_err(DbError::from)?;

            StateId(next)
        };

        {
            let mut selections = write.open_table(SELECTIONS).map_err(DbError::from)?;
            for (identifier, selection_kind, flags) in entries {
                let entry = StateEntryBinary {
                    state_id: id,
                    flags,
                    kind: selection_kind,
                    identifier: identifier.clone(),
                };
                selections
                    .insert(selection_key(id, &identifier).as_slice(), entry.encode().as_slice())
                    .map_err(DbError::from)?;
            }
        }

        write.commit().map_err(DbError::from)?;

        Ok(id)
    }

    /// Upsert: writing the same `(state_id, identifier)` twice replaces the
    /// prior entry.
    pub fn mark_selection(
        &self,
        state_id: StateId,
        identifier: &str,
        kind: SelectionType,
        flags: SelectionFlags,
    ) -> Result<(), StateDbError> {
        let write = self.db.begin_write().map_err(DbError::from)?;
        {
            let mut selections = write.open_table(SELECTIONS).map_err(DbError::from)?;
            let entry = StateEntry {
                state_id,
                identifier: identifier.to_string(),
                kind,
                flags,
            }
            .to_binary();
            selections
                .insert(selection_key(state_id, identifier).as_slice(), entry.encode().as_slice())
                .map_err(DbError::from)?;
        }
        write.commit().map_err(DbError::from)?;
        Ok(())
    }

    pub fn unmark_selection(&self, state_id: StateId, identifier: &str) -> Result<(), StateDbError> {
        let write = self.db.begin_write().map_err(DbError::from)?;
        {
            let mut selections = write.open_table(SELECTIONS).map_err(DbError::from)?;
            selections.remove(selection_key(state_id, identifier).as_slice()).map_err(DbError::from)?;
        }
        write.commit().map_err(DbError::from)?;
        Ok(())
    }

    pub fn entries(&self, state_id: StateId) -> Result<Vec<StateEntry>, StateDbError> {
        let read = self.db.begin_read().map_err(DbError::from)?;
        let table = read.open_table(SELECTIONS).map_err(DbError::from)?;

        let prefix = state_id.0.to_be_bytes();
        let mut out = vec![];

        for row in table.iter().map_err(DbError::from)? {
            let (key, value) = row.map_err(DbError::from)?;
            if key.value().starts_with(&prefix) {
                out.push(StateEntry::from(StateEntryBinary::decode(value.value())?));
            }
        }

        Ok(out)
    }

    pub fn active_state(&self) -> Result<Option<StateId>, StateDbError> {
        let read = self.db.begin_read().map_err(DbError::from)?;
        let table = read.open_table(STATES).map_err(DbError::from)?;

        Ok(table
            .iter()
            .map_err(DbError::from)?
            .next_back()
            .transpose()
            .map_err(DbError::from)?
            .map(|(k, _)| StateId(k.value())))
    }

    pub fn close(&self) {}
}

fn encode_record(record: &StateRecord) -> Vec<u8> {
    serde_json::json!({
        "name": record.name,
        "description": record.description,
        "type": record.kind.to_string(),
        "timestamp": record.timestamp.to_rfc3339(),
    })
    .to_string()
    .into_bytes()
}

#[cfg(test)]
mod test {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn binary_encoding_roundtrip() {
        let entry = StateEntryBinary {
            state_id: StateId(7),
            flags: SelectionFlags::USER_INSTALLED | SelectionFlags::DEFAULT_POLICY,
            kind: SelectionType::Binary,
            identifier: "bash".into(),
        };

        let decoded = StateEntryBinary::decode(&entry.encode()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn state_ids_are_monotonic() {
        let dir = tempdir().unwrap();
        let db = StateDB::connect(dir.path().join("state.db")).unwrap();

        let first = db.new_state("initial", "", StateType::Transaction, Utc::now(), []).unwrap();
        let second = db
            .new_state("install foo", "", StateType::Transaction, Utc::now(), [])
            .unwrap();

        assert_eq!(first, StateId(1));
        assert_eq!(second, StateId(2));
        assert_eq!(db.active_state().unwrap(), Some(StateId(2)));
    }

    #[test]
    fn mark_selection_upserts() {
        let dir = tempdir().unwrap();
        let db = StateDB::connect(dir.path().join("state.db")).unwrap();
        let state = db.new_state("initial", "", StateType::Transaction, Utc::now(), []).unwrap();

        db.mark_selection(state, "foo", SelectionType::Source, SelectionFlags::USER_INSTALLED)
            .unwrap();
        db.mark_selection(state, "foo", SelectionType::Binary, SelectionFlags::DEP_INSTALLED)
            .unwrap();

        let entries = db.entries(state).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, SelectionType::Binary);
        assert_eq!(entries[0].flags, SelectionFlags::DEP_INSTALLED);
    }

    #[test]
    fn unmark_removes_selection() {
        let dir = tempdir().unwrap();
        let db = StateDB::connect(dir.path().join("state.db")).unwrap();
        let state = db.new_state("initial", "", StateType::Transaction, Utc::now(), []).unwrap();

        db.mark_selection(state, "foo", SelectionType::Binary, SelectionFlags::USER_INSTALLED)
            .unwrap();
        db.unmark_selection(state, "foo").unwrap();

        assert!(db.entries(state).unwrap().is_empty());
    }
}
