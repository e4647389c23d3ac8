// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The [`RegistryPlugin`] capability interface, behind a trait object rather
//! than the closed enum a generated-dispatch design would use - adding a
//! source means implementing the trait, not editing every match arm in
//! [`super::Registry`].

use std::fmt;

use crate::{
    dependency::{Dependency, Kind, Provider},
    error::{ErrorKind, HasKind},
    fetch::{CachePool, FetchContext},
    package::{Id, ItemInfo},
};

pub mod cobble;
pub mod installed;
pub mod remote;

bitflags::bitflags! {
    /// Filters applied when listing or querying items from a plugin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ItemFlags: u32 {
        const AVAILABLE = 0b01;
        const INSTALLED = 0b10;
    }
}

/// A candidate returned by a plugin query, carrying which plugin it came
/// from so a downstream resolver can apply a prefer-installed-over-remote
/// policy without the registry doing that collapsing itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryItem {
    pub id: Id,
    pub source: String,
    pub flags: ItemFlags,
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    MetaDb(#[from] crate::db::meta::MetaDbError),
    #[error("malformed entry: {0}")]
    MalformedEntry(String),
}

impl HasKind for PluginError {
    fn kind(&self) -> ErrorKind {
        match self {
            PluginError::MetaDb(e) => e.kind(),
            PluginError::MalformedEntry(_) => ErrorKind::MalformedEntry,
        }
    }
}

/// Capability for one package source. Queries never fail outwardly: a
/// plugin that hits an internal error logs it and returns an empty result,
/// per the "plugin queries never throw" failure model.
pub trait RegistryPlugin: fmt::Debug {
    /// Higher priority wins placement earlier in fan-out results.
    fn priority(&self) -> u64;

    fn query_providers(&self, kind: Kind, matcher: &str, flags: ItemFlags) -> Vec<RegistryItem>;

    fn query_id(&self, id: &Id) -> Option<RegistryItem>;

    fn dependencies(&self, id: &Id) -> Vec<Dependency>;

    fn providers(&self, id: &Id) -> Vec<Provider>;

    fn info(&self, id: &Id) -> ItemInfo;

    fn list(&self, flags: ItemFlags) -> Vec<RegistryItem>;

    fn fetch_item(&self, ctx: &dyn FetchContext, pool: &dyn CachePool, id: &Id) -> Result<(), PluginError>;

    fn close(&self);
}

/// Orders plugins highest-priority-first; insertion sequence breaks ties so
/// registration order is preserved among equal priorities.
pub(super) struct PriorityOrdered {
    pub priority: u64,
    pub sequence: u64,
    pub plugin: Box<dyn RegistryPlugin>,
}

impl PartialEq for PriorityOrdered {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for PriorityOrdered {}

impl PartialOrd for PriorityOrdered {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityOrdered {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .reverse()
            .then(self.sequence.cmp(&other.sequence))
    }
}
