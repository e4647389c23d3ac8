// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! A plugin wrapping a [`MetaDB`] fed by a remote repository's `stone.index`.

use std::{
    io::{BufReader, Read},
    path::Path,
};

use log::warn;
use stone::{read_bytes as read_stone_bytes, StoneHeader, StoneHeaderV1FileType};
use url::Url;

use crate::{
    db::meta::MetaDB,
    dependency::Kind,
    environment,
    fetch::{CachePool, Fetchable, FetchContext},
    installation::Mutability,
    package::{self, ItemInfo},
    registry::plugin::{ItemFlags, PluginError, RegistryItem, RegistryPlugin},
};

#[derive(Debug)]
pub struct RemotePlugin {
    id: String,
    uri: Url,
    priority: u64,
    db: MetaDB,
}

impl RemotePlugin {
    pub fn new(id: impl Into<String>, uri: Url, priority: u64, db: MetaDB) -> Self {
        Self {
            id: id.into(),
            uri,
            priority,
            db,
        }
    }

    /// Enqueues a fetch of this remote's index file; the caller is
    /// responsible for invoking [`Self::ingest`] once it lands, since index
    /// completion is delivered asynchronously by the fetch layer and this
    /// plugin has no callback registration mechanism of its own.
    pub fn refresh(&self, ctx: &dyn FetchContext, destination: impl Into<std::path::PathBuf>) {
        ctx.enqueue(Fetchable {
            uri: self.uri.clone(),
            destination: destination.into(),
            expected_size: 0,
        });
    }

    /// Parses a downloaded `stone.index` and atomically replaces this
    /// remote's catalog with its contents.
    pub fn ingest(&self, index_path: &Path) -> Result<(), PluginError> {
        let file = fs_err::File::open(index_path).map_err(|e| PluginError::MalformedEntry(e.to_string()))?;
        let mut bytes = vec![];
        BufReader::with_capacity(environment::FILE_READ_BUFFER_SIZE, file)
            .read_to_end(&mut bytes)
            .map_err(|e| PluginError::MalformedEntry(e.to_string()))?;

        let mut reader = read_stone_bytes(&bytes).map_err(|e| PluginError::MalformedEntry(e.to_string()))?;

        match reader.header {
            StoneHeader::V1(v1) if v1.file_type == StoneHeaderV1FileType::Repository => {}
            StoneHeader::V1(v1) => {
                return Err(PluginError::MalformedEntry(format!(
                    "{}: expected a repository index archive, found {:?}",
                    self.id, v1.file_type
                )))
            }
        }

        let payloads = reader
            .payloads()
            .map_err(|e| PluginError::MalformedEntry(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PluginError::MalformedEntry(e.to_string()))?;

        let mut entries = vec![];
        for payload in payloads {
            if let Some(meta) = payload.meta() {
                match package::Meta::from_stone_payload(&meta.body) {
                    Ok((id, entry)) => entries.push((id, entry)),
                    Err(error) => warn!("skipping malformed meta payload in {}: {error}", self.id),
                }
            }
        }

        self.db.load_from_index(entries)?;
        Ok(())
    }

    fn to_item(&self, id: package::Id) -> RegistryItem {
        RegistryItem {
            id,
            source: self.id.clone(),
            flags: ItemFlags::AVAILABLE,
        }
    }
}

impl RegistryPlugin for RemotePlugin {
    fn priority(&self) -> u64 {
        self.priority
    }

    fn query_providers(&self, kind: Kind, matcher: &str, flags: ItemFlags) -> Vec<RegistryItem> {
        if !flags.contains(ItemFlags::AVAILABLE) {
            return vec![];
        }

        let provider = crate::dependency::Provider::new(kind, matcher).to_string();

        match self.db.by_provider(&provider) {
            Ok(ids) => ids.into_iter().map(|id| self.to_item(id)).collect(),
            Err(error) => {
                warn!("{}: provider query failed: {error}", self.id);
                vec![]
            }
        }
    }

    fn query_id(&self, id: &package::Id) -> Option<RegistryItem> {
        match self.db.has_id(id) {
            Ok(true) => Some(self.to_item(id.clone())),
            Ok(false) => None,
            Err(error) => {
                warn!("{}: id lookup failed: {error}", self.id);
                None
            }
        }
    }

    fn dependencies(&self, id: &package::Id) -> Vec<crate::dependency::Dependency> {
        self.db.get_value(id).ok().flatten().map(|m| m.dependencies).unwrap_or_default()
    }

    fn providers(&self, id: &package::Id) -> Vec<crate::dependency::Provider> {
        self.db.get_value(id).ok().flatten().map(|m| m.providers).unwrap_or_default()
    }

    fn info(&self, id: &package::Id) -> ItemInfo {
        self.db.info(id).ok().flatten().unwrap_or_default()
    }

    fn list(&self, flags: ItemFlags) -> Vec<RegistryItem> {
        if !flags.contains(ItemFlags::AVAILABLE) {
            return vec![];
        }

        match self.db.list() {
            Ok(rows) => rows.into_iter().map(|(id, _)| self.to_item(id)).collect(),
            Err(error) => {
                warn!("{}: list failed: {error}", self.id);
                vec![]
            }
        }
    }

    fn fetch_item(&self, ctx: &dyn FetchContext, pool: &dyn CachePool, id: &package::Id) -> Result<(), PluginError> {
        let Some(entry) = self.db.get_value(id).map_err(PluginError::from)? else {
            return Ok(());
        };

        let rel_uri = entry.uri.as_deref().ok_or_else(|| PluginError::MalformedEntry("missing uri".into()))?;
        let hash = entry.hash.clone().ok_or_else(|| PluginError::MalformedEntry("missing hash".into()))?;
        let size = entry.download_size.ok_or_else(|| PluginError::MalformedEntry("missing size".into()))?;

        if !rel_uri.ends_with(".stone") {
            return Err(PluginError::MalformedEntry(format!("package uri does not end in .stone: {rel_uri}")));
        }
        if hash.is_empty() {
            return Err(PluginError::MalformedEntry("empty package hash".into()));
        }
        if size == 0 {
            return Err(PluginError::MalformedEntry("zero expected size".into()));
        }

        let pkg_uri = self
            .uri
            .join(rel_uri)
            .map_err(|e| PluginError::MalformedEntry(format!("invalid package uri {rel_uri}: {e}")))?;

        ctx.enqueue(Fetchable {
            uri: pkg_uri,
            destination: pool.staging_path(&hash),
            expected_size: size,
        });

        Ok(())
    }

    fn close(&self) {
        self.db.close();
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, path::PathBuf};

    use tempfile::tempdir;

    use super::*;
    use crate::dependency::Provider;

    struct RecordingContext {
        seen: RefCell<Vec<Fetchable>>,
    }

    impl FetchContext for RecordingContext {
        fn enqueue(&self, fetchable: Fetchable) {
            self.seen.borrow_mut().push(fetchable);
        }
    }

    struct FixedPool;

    impl CachePool for FixedPool {
        fn staging_path(&self, hash: &str) -> PathBuf {
            PathBuf::from("/staging").join(hash)
        }

        fn final_path(&self, hash: &str) -> PathBuf {
            PathBuf::from("/pool").join(hash)
        }
    }

    fn plugin_with(meta: package::Meta) -> (package::Id, RemotePlugin) {
        let dir = tempdir().unwrap();
        let db = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadWrite).unwrap();
        let id = package::Id::from("foo-pkgid");
        db.load_from_index([(id.clone(), meta)]).unwrap();

        let plugin = RemotePlugin::new("test-remote", "https://r/stone.index".parse().unwrap(), 10, db);
        (id, plugin)
    }

    fn sample(uri: Option<&str>, hash: Option<&str>, size: Option<u64>) -> package::Meta {
        package::Meta {
            name: "foo".into(),
            version_identifier: "1.0".into(),
            source_release: 1,
            build_release: 0,
            architecture: "x86_64".into(),
            summary: String::new(),
            description: String::new(),
            source_id: "foo".into(),
            homepage: String::new(),
            licenses: vec![],
            dependencies: vec![],
            providers: vec![Provider::name("foo")],
            uri: uri.map(str::to_string),
            hash: hash.map(str::to_string),
            download_size: size,
        }
    }

    #[test]
    fn fetch_item_enqueues_package_uri_resolved_against_index() {
        let (id, plugin) = plugin_with(sample(Some("stone/foo.stone"), Some("abc"), Some(1024)));

        let ctx = RecordingContext { seen: RefCell::new(vec![]) };
        plugin.fetch_item(&ctx, &FixedPool, &id).unwrap();

        let seen = ctx.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].uri.as_str(), "https://r/stone/foo.stone");
        assert_eq!(seen[0].destination, PathBuf::from("/staging/abc"));
        assert_eq!(seen[0].expected_size, 1024);
    }

    #[test]
    fn fetch_item_rejects_uri_without_stone_suffix() {
        let (id, plugin) = plugin_with(sample(Some("stone/foo.tar"), Some("abc"), Some(1024)));

        let ctx = RecordingContext { seen: RefCell::new(vec![]) };
        assert!(plugin.fetch_item(&ctx, &FixedPool, &id).is_err());
    }

    #[test]
    fn fetch_item_rejects_zero_size() {
        let (id, plugin) = plugin_with(sample(Some("stone/foo.stone"), Some("abc"), Some(0)));

        let ctx = RecordingContext { seen: RefCell::new(vec![]) };
        assert!(plugin.fetch_item(&ctx, &FixedPool, &id).is_err());
    }

    #[test]
    fn fetch_item_rejects_missing_hash() {
        let (id, plugin) = plugin_with(sample(Some("stone/foo.stone"), None, Some(1024)));

        let ctx = RecordingContext { seen: RefCell::new(vec![]) };
        assert!(plugin.fetch_item(&ctx, &FixedPool, &id).is_err());
    }

    fn archive_with_file_type(file_type: stone::StoneHeaderV1FileType) -> Vec<u8> {
        use stone::{
            Record, StoneHeaderV1, StonePayloadCompression, StonePayloadKind, StonePayloadMeta,
            StonePayloadMetaKind, StonePayloadMetaTag,
        };
        use xxhash_rust::xxh3::Xxh3;

        let record = StonePayloadMeta {
            tag: StonePayloadMetaTag::Name,
            kind: StonePayloadMetaKind::String("bash".into()),
        };

        let mut body = vec![];
        record.encode(&mut body).expect("encode record");

        let mut hasher = Xxh3::new();
        hasher.update(&body);
        let checksum = (hasher.digest() as u64).to_be_bytes();

        let mut archive = vec![];
        StoneHeader::V1(StoneHeaderV1 { num_payloads: 1, file_type })
            .encode(&mut archive)
            .expect("encode header");

        stone::StonePayloadHeader {
            stored_size: body.len() as u64,
            plain_size: body.len() as u64,
            checksum,
            num_records: 1,
            version: 1,
            kind: StonePayloadKind::Meta,
            compression: StonePayloadCompression::None,
        }
        .encode(&mut archive)
        .expect("encode payload header");
        archive.extend_from_slice(&body);

        archive
    }

    #[test]
    fn ingest_rejects_non_repository_archive() {
        let dir = tempdir().unwrap();
        let db = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadWrite).unwrap();
        let plugin = RemotePlugin::new("test-remote", "https://r/stone.index".parse().unwrap(), 10, db);

        let index_path = dir.path().join("stone.index");
        std::fs::write(&index_path, archive_with_file_type(StoneHeaderV1FileType::Binary)).unwrap();

        assert!(plugin.ingest(&index_path).is_err());
    }

    #[test]
    fn ingest_accepts_repository_archive() {
        let dir = tempdir().unwrap();
        let db = MetaDB::connect(dir.path().join("meta.db"), Mutability::ReadWrite).unwrap();
        let plugin = RemotePlugin::new("test-remote", "https://r/stone.index".parse().unwrap(), 10, db);

        let index_path = dir.path().join("stone.index");
        std::fs::write(&index_path, archive_with_file_type(StoneHeaderV1FileType::Repository)).unwrap();

        assert!(plugin.ingest(&index_path).is_ok());
    }
}
