// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! MetaDB: the package catalog. One instance per remote repository plus one
//! reflecting the currently installed set.

use std::path::Path;

use log::{debug, trace};
use redb::{Database, ReadableTable, TableDefinition};

use crate::{
    db::{DbError, Encoding},
    environment,
    error::{ErrorKind, HasKind},
    installation::Mutability,
    package::{Id, ItemInfo, Meta},
};

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");
const PROVIDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("providers");

impl Encoding for Meta {
    type Error = serde_json::Error;

    fn encode(&self) -> Vec<u8> {
        // Infallible: Meta has no types that reject JSON serialization.
        serde_json::to_vec(self).expect("serialize meta entry")
    }

    fn decode(bytes: &[u8]) -> Result<Self, Self::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetaDbError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("not found: {0}")]
    NotFound(String),
}

impl HasKind for MetaDbError {
    fn kind(&self) -> ErrorKind {
        match self {
            MetaDbError::Db(e) => e.kind(),
            MetaDbError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// The package catalog: `pkgID -> Meta`, plus a secondary `provider -> [pkgID]`
/// index used to resolve dependency/provider queries without a full scan.
#[derive(Debug)]
pub struct MetaDB {
    db: Database,
}

impl MetaDB {
    pub fn connect(path: impl AsRef<Path>, mutability: Mutability) -> Result<Self, MetaDbError> {
        let path = path.as_ref();
        trace!("opening meta db at {path:?} ({mutability})");

        if mutability == Mutability::ReadOnly && !path.exists() {
            return Err(MetaDbError::NotFound(path.display().to_string()));
        }

        let db = Database::create(path).map_err(DbError::from)?;

        {
            let write = db.begin_write().map_err(DbError::from)?;
            write.open_table(ENTRIES).map_err(DbError::from)?;
            write.open_table(PROVIDERS).map_err(DbError::from)?;
            write.commit().map_err(DbError::from)?;
        }

        Ok(Self { db })
    }

    /// Summary view of one entry; never errors on a missing row, returns
    /// `None` instead so listing code can skip stale provider-index hits.
    pub fn info(&self, id: &Id) -> Result<Option<ItemInfo>, MetaDbError> {
        Ok(self.get_value(id)?.as_ref().map(ItemInfo::from))
    }

    pub fn get_value(&self, id: &Id) -> Result<Option<Meta>, MetaDbError> {
        let read = self.db.begin_read().map_err(DbError::from)?;
        let table = read.open_table(ENTRIES).map_err(DbError::from)?;

        let Some(row) = table.get(id.as_ref()).map_err(DbError::from)? else {
            return Ok(None);
        };

        let meta = Meta::decode(row.value()).map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(Some(meta))
    }

    pub fn has_id(&self, id: &Id) -> Result<bool, MetaDbError> {
        Ok(self.get_value(id)?.is_some())
    }

    pub fn list(&self) -> Result<Vec<(Id, Meta)>, MetaDbError> {
        let read = self.db.begin_read().map_err(DbError::from)?;
        let table = read.open_table(ENTRIES).map_err(DbError::from)?;

        let mut out = vec![];
        for row in table.iter().map_err(DbError::from)? {
            let (key, value) = row.map_err(DbError::from)?;
            let meta = Meta::decode(value.value()).map_err(|e| DbError::Decode(e.to_string()))?;
            out.push((Id::from(key.value()), meta));
        }
        Ok(out)
    }

    pub fn by_provider(&self, provider: &str) -> Result<Vec<Id>, MetaDbError> {
        let read = self.db.begin_read().map_err(DbError::from)?;
        let table = read.open_table(PROVIDERS).map_err(DbError::from)?;

        let Some(row) = table.get(provider).map_err(DbError::from)? else {
            return Ok(vec![]);
        };

        let ids: Vec<String> = serde_json::from_slice(row.value()).map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(ids.into_iter().map(Id::from).collect())
    }

    /// Atomically replaces the whole catalog with `entries`, rebuilding the
    /// provider index in the same write transaction so a reader never
    /// observes a catalog/index pair from different generations.
    pub fn load_from_index(&self, entries: impl IntoIterator<Item = (Id, Meta)>) -> Result<(), MetaDbError> {
        let write = self.db.begin_write().map_err(DbError::from)?;
        let mut count = 0usize;

        {
            let mut entries_table = write.open_table(ENTRIES).map_err(DbError::from)?;
            let mut providers_table = write.open_table(PROVIDERS).map_err(DbError::from)?;

            entries_table.retain(|_, _| false).map_err(DbError::from)?;
            providers_table.retain(|_, _| false).map_err(DbError::from)?;

            let mut provider_index: std::collections::BTreeMap<String, Vec<String>> = Default::default();

            for (id, meta) in entries {
                for provider in meta.all_providers() {
                    let row = provider_index.entry(provider.to_string()).or_default();
                    if !row.contains(&id.0) {
                        row.push(id.0.clone());
                    }
                }

                entries_table.insert(id.0.as_str(), meta.encode().as_slice()).map_err(DbError::from)?;
                count += 1;

                if count % environment::DB_BATCH_SIZE == 0 {
                    trace!("loaded {count} entries so far");
                }
            }

            for (provider, ids) in provider_index {
                let bytes = serde_json::to_vec(&ids).expect("serialize provider index row");
                providers_table.insert(provider.as_str(), bytes.as_slice()).map_err(DbError::from)?;
            }
        }

        write.commit().map_err(DbError::from)?;
        debug!("loaded {count} entries into meta db");

        Ok(())
    }

    /// No-op; `redb::Database` has no explicit close and the handle is
    /// dropped with the `MetaDB`. Calling this any number of times is
    /// harmless.
    pub fn close(&self) {}
}

#[cfg(test)]
mod test {
    use tempfile::tempdir;

    use super::*;
    use crate::dependency::Provider;

    fn sample(name: &str) -> Meta {
        Meta {
            name: name.to_string(),
            version_identifier: "1.0".into(),
            source_release: 1,
            build_release: 0,
            architecture: "x86_64".into(),
            summary: String::new(),
            description: String::new(),
            source_id: name.to_string(),
            homepage: String::new(),
            licenses: vec![],
            dependencies: vec![],
            providers: vec![Provider::name(name)],
            uri: None,
            hash: None,
            download_size: None,
        }
    }

    #[test]
    fn load_then_query() {
        let dir = tempdir().unwrap();
        let db = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadWrite).unwrap();

        let id = Id::from("abc123");
        db.load_from_index([(id.clone(), sample("bash"))]).unwrap();

        assert!(db.has_id(&id).unwrap());
        assert_eq!(db.list().unwrap().len(), 1);
        assert_eq!(db.by_provider("bash").unwrap(), vec![id]);
    }

    #[test]
    fn reload_replaces_prior_contents() {
        let dir = tempdir().unwrap();
        let db = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadWrite).unwrap();

        db.load_from_index([(Id::from("a"), sample("bash"))]).unwrap();
        db.load_from_index([(Id::from("b"), sample("zsh"))]).unwrap();

        assert!(!db.has_id(&Id::from("a")).unwrap());
        assert!(db.has_id(&Id::from("b")).unwrap());
        assert!(db.by_provider("bash").unwrap().is_empty());
    }

    #[test]
    fn missing_entry_returns_none() {
        let dir = tempdir().unwrap();
        let db = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadWrite).unwrap();

        assert_eq!(db.info(&Id::from("nope")).unwrap(), None);
    }

    #[test]
    fn read_only_connect_of_absent_store_fails_not_found() {
        let dir = tempdir().unwrap();
        let result = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadOnly);

        assert!(matches!(result, Err(MetaDbError::NotFound(_))));
    }

    #[test]
    fn read_only_connect_of_existing_store_succeeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.db");

        MetaDB::connect(&path, Mutability::ReadWrite).unwrap();
        assert!(MetaDB::connect(&path, Mutability::ReadOnly).is_ok());
    }

    #[test]
    fn load_from_index_dedupes_repeated_provider() {
        let dir = tempdir().unwrap();
        let db = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadWrite).unwrap();

        let mut entry = sample("bash");
        entry.providers = vec![Provider::name("bash"), Provider::name("bash")];

        let id = Id::from("abc123");
        db.load_from_index([(id.clone(), entry)]).unwrap();

        assert_eq!(db.by_provider("bash").unwrap(), vec![id]);
    }
}
