// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Federates an ordered set of [`plugin::RegistryPlugin`]s and answers
//! provider/name/id queries across all of them.

use std::collections::BTreeSet;

pub mod plugin;

pub use plugin::{ItemFlags, PluginError, RegistryItem, RegistryPlugin};

use crate::{
    dependency::{Dependency, Kind, Provider},
    fetch::{CachePool, FetchContext},
    package::{Id, ItemInfo},
};

/// Ordered collection of package sources: installed set, remotes, side-loaded
/// archives. Plugins are queried highest-priority-first; the registry itself
/// never deduplicates or resolves conflicts between candidates.
#[derive(Default)]
pub struct Registry {
    plugins: BTreeSet<plugin::PriorityOrdered>,
    next_sequence: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(&mut self, plugin: Box<dyn RegistryPlugin>) {
        let priority = plugin.priority();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.plugins.insert(plugin::PriorityOrdered {
            priority,
            sequence,
            plugin,
        });
    }

    /// Concatenation of each plugin's `PackageName` query, in priority order.
    /// Duplicates across plugins are intentionally not collapsed here - a
    /// resolver downstream applies prefer-installed/remote/cobble policy.
    pub fn by_name(&self, name: &str) -> Vec<RegistryItem> {
        self.plugins
            .iter()
            .flat_map(|p| p.plugin.query_providers(Kind::PackageName, name, ItemFlags::AVAILABLE))
            .collect()
    }

    /// First plugin (by priority) that resolves `id`; short-circuits.
    pub fn by_id(&self, id: &Id) -> Option<RegistryItem> {
        self.plugins.iter().find_map(|p| p.plugin.query_id(id))
    }

    pub fn by_provider(&self, kind: Kind, matcher: &str) -> Vec<RegistryItem> {
        self.plugins
            .iter()
            .flat_map(|p| p.plugin.query_providers(kind, matcher, ItemFlags::AVAILABLE))
            .collect()
    }

    pub fn list(&self, flags: ItemFlags) -> Vec<RegistryItem> {
        self.plugins.iter().flat_map(|p| p.plugin.list(flags)).collect()
    }

    /// Dependencies/providers come from whichever plugin owns `id`; unlike
    /// `by_name`/`by_provider` there is nothing to fan out across.
    pub fn dependencies(&self, id: &Id) -> Vec<Dependency> {
        self.plugins
            .iter()
            .map(|p| p.plugin.dependencies(id))
            .find(|deps| !deps.is_empty())
            .unwrap_or_default()
    }

    pub fn providers(&self, id: &Id) -> Vec<Provider> {
        self.plugins
            .iter()
            .map(|p| p.plugin.providers(id))
            .find(|provs| !provs.is_empty())
            .unwrap_or_default()
    }

    pub fn info(&self, id: &Id) -> ItemInfo {
        self.plugins
            .iter()
            .map(|p| p.plugin.info(id))
            .find(|info| info != &ItemInfo::default())
            .unwrap_or_default()
    }

    pub fn fetch_item(&self, ctx: &dyn FetchContext, pool: &dyn CachePool, id: &Id) -> Result<(), PluginError> {
        for entry in &self.plugins {
            if entry.plugin.query_id(id).is_some() {
                return entry.plugin.fetch_item(ctx, pool, id);
            }
        }
        Ok(())
    }

    /// Closes each plugin in registration order - unlike the query methods,
    /// this does not follow plugin priority.
    pub fn close(&self) {
        let mut plugins: Vec<&plugin::PriorityOrdered> = self.plugins.iter().collect();
        plugins.sort_by_key(|p| p.sequence);

        for plugin in plugins {
            plugin.plugin.close();
        }
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Debug)]
    struct TestPlugin {
        priority: u64,
        items: Vec<RegistryItem>,
    }

    impl RegistryPlugin for TestPlugin {
        fn priority(&self) -> u64 {
            self.priority
        }

        fn query_providers(&self, kind: Kind, _matcher: &str, flags: ItemFlags) -> Vec<RegistryItem> {
            if kind != Kind::PackageName {
                return vec![];
            }
            self.items.iter().filter(|i| i.flags.contains(flags)).cloned().collect()
        }

        fn query_id(&self, id: &Id) -> Option<RegistryItem> {
            self.items.iter().find(|i| &i.id == id).cloned()
        }

        fn dependencies(&self, _id: &Id) -> Vec<Dependency> {
            vec![]
        }

        fn providers(&self, _id: &Id) -> Vec<Provider> {
            vec![]
        }

        fn info(&self, _id: &Id) -> ItemInfo {
            ItemInfo::default()
        }

        fn list(&self, flags: ItemFlags) -> Vec<RegistryItem> {
            self.items.iter().filter(|i| i.flags.contains(flags)).cloned().collect()
        }

        fn fetch_item(&self, _ctx: &dyn FetchContext, _pool: &dyn CachePool, _id: &Id) -> Result<(), PluginError> {
            Ok(())
        }

        fn close(&self) {}
    }

    fn item(id: &str) -> RegistryItem {
        RegistryItem {
            id: Id::from(id),
            source: "test".into(),
            flags: ItemFlags::AVAILABLE,
        }
    }

    #[test]
    fn plugins_ordered_by_priority_then_registration() {
        let mut registry = Registry::new();

        registry.add_plugin(Box::new(TestPlugin {
            priority: 1,
            items: vec![item("a"), item("b")],
        }));
        registry.add_plugin(Box::new(TestPlugin {
            priority: 50,
            items: vec![item("c"), item("d")],
        }));

        let ids: Vec<_> = registry.list(ItemFlags::AVAILABLE).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![Id::from("c"), Id::from("d"), Id::from("a"), Id::from("b")]);
    }

    #[test]
    fn by_id_short_circuits_on_first_match() {
        let mut registry = Registry::new();
        registry.add_plugin(Box::new(TestPlugin {
            priority: 10,
            items: vec![item("a")],
        }));
        registry.add_plugin(Box::new(TestPlugin {
            priority: 1,
            items: vec![item("a"), item("b")],
        }));

        assert_eq!(registry.by_id(&Id::from("a")), Some(item("a")));
        assert_eq!(registry.by_id(&Id::from("b")), Some(item("b")));
        assert_eq!(registry.by_id(&Id::from("missing")), None);
    }

    #[test]
    fn by_name_does_not_dedupe_across_plugins() {
        let mut registry = Registry::new();
        registry.add_plugin(Box::new(TestPlugin {
            priority: 10,
            items: vec![item("a")],
        }));
        registry.add_plugin(Box::new(TestPlugin {
            priority: 5,
            items: vec![item("a")],
        }));

        assert_eq!(registry.by_name("a").len(), 2);
    }

    #[derive(Debug)]
    struct ClosingPlugin {
        name: &'static str,
        priority: u64,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl RegistryPlugin for ClosingPlugin {
        fn priority(&self) -> u64 {
            self.priority
        }

        fn query_providers(&self, _kind: Kind, _matcher: &str, _flags: ItemFlags) -> Vec<RegistryItem> {
            vec![]
        }

        fn query_id(&self, _id: &Id) -> Option<RegistryItem> {
            None
        }

        fn dependencies(&self, _id: &Id) -> Vec<Dependency> {
            vec![]
        }

        fn providers(&self, _id: &Id) -> Vec<Provider> {
            vec![]
        }

        fn info(&self, _id: &Id) -> ItemInfo {
            ItemInfo::default()
        }

        fn list(&self, _flags: ItemFlags) -> Vec<RegistryItem> {
            vec![]
        }

        fn fetch_item(&self, _ctx: &dyn FetchContext, _pool: &dyn CachePool, _id: &Id) -> Result<(), PluginError> {
            Ok(())
        }

        fn close(&self) {
            self.log.borrow_mut().push(self.name);
        }
    }

    #[test]
    fn close_follows_registration_order_not_priority() {
        let log = Rc::new(RefCell::new(vec![]));
        let mut registry = Registry::new();

        registry.add_plugin(Box::new(ClosingPlugin {
            name: "remote",
            priority: 10,
            log: log.clone(),
        }));
        registry.add_plugin(Box::new(ClosingPlugin {
            name: "installed",
            priority: u64::MAX,
            log: log.clone(),
        }));

        // "installed" outranks "remote" in priority order but was registered
        // second; close() must still run "remote" first.
        registry.close();

        assert_eq!(*log.borrow(), vec!["remote", "installed"]);
    }
}
