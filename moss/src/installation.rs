// SPDX-FileCopyrightText: Copyright © 2020-2023 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use log::{trace, warn};
use nix::unistd::{access, AccessFlags, Uid};

use crate::{db::state::StateId, fetch::CachePool};

/// Whether the installation root is writable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// We only have read-only access
    ReadOnly,
    /// We have read-write access
    ReadWrite,
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutability::ReadOnly => "read-only".fmt(f),
            Mutability::ReadWrite => "read-write".fmt(f),
        }
    }
}

/// Binds a root directory to its derived db/cache/state paths and detected
/// mutability. Constructed once by the embedding binary and passed by
/// reference through every constructor that needs to know where things live -
/// there is no global singleton.
#[derive(Debug, Clone)]
pub struct Installation {
    pub root: PathBuf,
    pub mutability: Mutability,
    pub active_state: Option<StateId>,
}

impl Installation {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();

        let active_state = read_state_id(&root);

        if let Some(id) = &active_state {
            trace!("active state id: {id}");
        } else {
            warn!("unable to discover active state id");
        }

        let mutability = if Uid::effective().is_root() {
            Mutability::ReadWrite
        } else if access(&root, AccessFlags::W_OK).is_ok() {
            Mutability::ReadWrite
        } else {
            Mutability::ReadOnly
        };

        trace!("mutability: {mutability}");
        trace!("root dir: {root:?}");

        if matches!(mutability, Mutability::ReadWrite) {
            ensure_dirs_exist(&root);
        }

        Self {
            root,
            mutability,
            active_state,
        }
    }

    pub fn read_only(&self) -> bool {
        matches!(self.mutability, Mutability::ReadOnly)
    }

    fn moss_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join("var/lib/moss").join(path)
    }

    pub fn meta_db_path(&self) -> PathBuf {
        self.moss_path("db/meta.db")
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.moss_path("db/state.db")
    }

    pub fn remote_db_path(&self, remote_id: &str) -> PathBuf {
        self.moss_path(format!("remotes/{remote_id}/db"))
    }

    pub fn remote_index_path(&self, remote_id: &str) -> PathBuf {
        self.moss_path(format!("remotes/{remote_id}/cache/stone.index"))
    }

    pub fn staging_path(&self, identifier: impl AsRef<str>) -> PathBuf {
        self.moss_path("cache/staging").join(identifier.as_ref())
    }

    pub fn final_path(&self, identifier: impl AsRef<str>) -> PathBuf {
        self.moss_path("cache/pool").join(identifier.as_ref())
    }
}

impl CachePool for Installation {
    fn staging_path(&self, hash: &str) -> PathBuf {
        Installation::staging_path(self, hash)
    }

    fn final_path(&self, hash: &str) -> PathBuf {
        Installation::final_path(self, hash)
    }
}

/// In older versions of moss the active state was recorded via a symlink;
/// the current layout records it directly in `/usr/.stateID`.
fn read_state_id(root: &Path) -> Option<StateId> {
    let usr_path = root.join("usr");
    let state_path = usr_path.join(".stateID");

    if let Some(id) = fs::read_to_string(&state_path).ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        return Some(StateId::from(id));
    } else if let Ok(usr_target) = usr_path.read_link() {
        return read_legacy_state_id(&usr_target);
    }

    None
}

fn read_legacy_state_id(usr_target: &Path) -> Option<StateId> {
    if usr_target.ends_with("usr") {
        let parent = usr_target.parent()?;
        let base = parent.file_name()?;
        let id = base.to_str()?.parse::<u64>().ok()?;

        return Some(StateId::from(id));
    }

    None
}

fn ensure_dirs_exist(root: &Path) {
    let moss = root.join("var/lib/moss");

    for path in [
        moss.join("db"),
        moss.join("remotes"),
        moss.join("cache/staging"),
        moss.join("cache/pool"),
    ] {
        if let Err(error) = fs::create_dir_all(&path) {
            warn!("failed to create {path:?}: {error}");
        }
    }
}
