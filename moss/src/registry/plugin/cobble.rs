// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! In-memory plugin for side-loaded local archives, e.g. `moss install
//! ./some.stone`.

use std::{
    collections::BTreeMap,
    io::{BufReader, Read},
    sync::Mutex,
};

use log::warn;
use stone::read_bytes as read_stone_bytes;

use crate::{
    dependency::Kind,
    environment,
    fetch::{CachePool, FetchContext},
    package::{self, ItemInfo, Meta},
    registry::plugin::{ItemFlags, PluginError, RegistryItem, RegistryPlugin},
};

/// Priority above any remote - a locally side-loaded archive should win a
/// by-name tie-break over anything fetched.
const PRIORITY: u64 = u64::MAX;

#[derive(Debug, Default)]
pub struct CobblePlugin {
    candidates: Mutex<BTreeMap<package::Id, Meta>>,
}

impl CobblePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a local stone archive, extracts its Meta payload, and registers
    /// the resulting candidate.
    pub fn load(&self, path: &std::path::Path) -> Result<package::Id, PluginError> {
        let file = fs_err::File::open(path).map_err(|e| PluginError::MalformedEntry(e.to_string()))?;
        let mut bytes = vec![];
        BufReader::with_capacity(environment::FILE_READ_BUFFER_SIZE, file)
            .read_to_end(&mut bytes)
            .map_err(|e| PluginError::MalformedEntry(e.to_string()))?;

        let mut reader = read_stone_bytes(&bytes).map_err(|e| PluginError::MalformedEntry(e.to_string()))?;

        let payloads = reader
            .payloads()
            .map_err(|e| PluginError::MalformedEntry(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PluginError::MalformedEntry(e.to_string()))?;

        let records = payloads
            .iter()
            .find_map(|p| p.meta())
            .ok_or_else(|| PluginError::MalformedEntry("no meta payload in archive".into()))?;

        let (id, meta) = Meta::from_stone_payload(&records.body).map_err(|e| PluginError::MalformedEntry(e.to_string()))?;

        self.candidates.lock().expect("cobble lock poisoned").insert(id.clone(), meta);

        Ok(id)
    }

    fn to_item(&self, id: package::Id) -> RegistryItem {
        RegistryItem {
            id,
            source: "cobble".into(),
            flags: ItemFlags::AVAILABLE,
        }
    }
}

impl RegistryPlugin for CobblePlugin {
    fn priority(&self) -> u64 {
        PRIORITY
    }

    fn query_providers(&self, kind: Kind, matcher: &str, flags: ItemFlags) -> Vec<RegistryItem> {
        if !flags.contains(ItemFlags::AVAILABLE) {
            return vec![];
        }

        self.candidates
            .lock()
            .expect("cobble lock poisoned")
            .iter()
            .filter(|(_, meta)| meta.all_providers().any(|p| p.kind == kind && p.identifier == matcher))
            .map(|(id, _)| self.to_item(id.clone()))
            .collect()
    }

    fn query_id(&self, id: &package::Id) -> Option<RegistryItem> {
        self.candidates
            .lock()
            .expect("cobble lock poisoned")
            .contains_key(id)
            .then(|| self.to_item(id.clone()))
    }

    fn dependencies(&self, id: &package::Id) -> Vec<crate::dependency::Dependency> {
        self.candidates
            .lock()
            .expect("cobble lock poisoned")
            .get(id)
            .map(|m| m.dependencies.clone())
            .unwrap_or_default()
    }

    fn providers(&self, id: &package::Id) -> Vec<crate::dependency::Provider> {
        self.candidates
            .lock()
            .expect("cobble lock poisoned")
            .get(id)
            .map(|m| m.providers.clone())
            .unwrap_or_default()
    }

    fn info(&self, id: &package::Id) -> ItemInfo {
        self.candidates
            .lock()
            .expect("cobble lock poisoned")
            .get(id)
            .map(ItemInfo::from)
            .unwrap_or_default()
    }

    fn list(&self, flags: ItemFlags) -> Vec<RegistryItem> {
        if !flags.contains(ItemFlags::AVAILABLE) {
            return vec![];
        }

        self.candidates
            .lock()
            .expect("cobble lock poisoned")
            .keys()
            .map(|id| self.to_item(id.clone()))
            .collect()
    }

    fn fetch_item(&self, _ctx: &dyn FetchContext, _pool: &dyn CachePool, id: &package::Id) -> Result<(), PluginError> {
        // Already on disk; nothing to fetch. Warn if the id isn't actually ours.
        if self.query_id(id).is_none() {
            warn!("fetch_item called on cobble plugin for unknown id {id}");
        }
        Ok(())
    }

    fn close(&self) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_id_not_found() {
        let plugin = CobblePlugin::new();
        assert!(plugin.query_id(&package::Id::from("nope")).is_none());
        assert!(plugin.list(ItemFlags::AVAILABLE).is_empty());
    }
}
