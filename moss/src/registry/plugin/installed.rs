// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! A [`MetaDB`] reflecting the currently installed set. Its contents track
//! the active state - keeping it in sync as selections change is the
//! responsibility of whatever drives `StateDB`, not this plugin.

use log::warn;

use crate::{
    db::meta::MetaDB,
    dependency::Kind,
    fetch::{CachePool, FetchContext},
    package::{self, ItemInfo},
    registry::plugin::{ItemFlags, PluginError, RegistryItem, RegistryPlugin},
};

/// Installed packages win any priority tie-break over remotes or cobble.
const PRIORITY: u64 = u64::MAX;

#[derive(Debug)]
pub struct InstalledPlugin {
    db: MetaDB,
}

impl InstalledPlugin {
    pub fn new(db: MetaDB) -> Self {
        Self { db }
    }

    fn to_item(&self, id: package::Id) -> RegistryItem {
        RegistryItem {
            id,
            source: "installed".into(),
            flags: ItemFlags::INSTALLED,
        }
    }
}

impl RegistryPlugin for InstalledPlugin {
    fn priority(&self) -> u64 {
        PRIORITY
    }

    fn query_providers(&self, kind: Kind, matcher: &str, flags: ItemFlags) -> Vec<RegistryItem> {
        if !flags.contains(ItemFlags::INSTALLED) {
            return vec![];
        }

        let provider = crate::dependency::Provider::new(kind, matcher).to_string();

        match self.db.by_provider(&provider) {
            Ok(ids) => ids.into_iter().map(|id| self.to_item(id)).collect(),
            Err(error) => {
                warn!("installed provider query failed: {error}");
                vec![]
            }
        }
    }

    fn query_id(&self, id: &package::Id) -> Option<RegistryItem> {
        match self.db.has_id(id) {
            Ok(true) => Some(self.to_item(id.clone())),
            Ok(false) => None,
            Err(error) => {
                warn!("installed id lookup failed: {error}");
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
        if !flags.contains(ItemFlags::INSTALLED) {
            return vec![];
        }

        match self.db.list() {
            Ok(rows) => rows.into_iter().map(|(id, _)| self.to_item(id)).collect(),
            Err(error) => {
                warn!("installed list failed: {error}");
                vec![]
            }
        }
    }

    fn fetch_item(&self, _ctx: &dyn FetchContext, _pool: &dyn CachePool, _id: &package::Id) -> Result<(), PluginError> {
        // Already installed; nothing to fetch.
        Ok(())
    }

    fn close(&self) {
        self.db.close();
    }
}
