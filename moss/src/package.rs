// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The catalog row ([`Meta`]) and its primary key ([`Id`], the `pkgID`).

use std::fmt;

use serde::{Deserialize, Serialize};
use stone::{StonePayloadMeta, StonePayloadMetaKind, StonePayloadMetaTag};
use xxhash_rust::xxh3::xxh3_128;

use crate::dependency::{Dependency, Kind, Provider};

/// Opaque, stable primary key for one built package artifact.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(pub String);

impl From<String> for Id {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

/// The catalog row; one per package build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    pub version_identifier: String,
    pub source_release: u64,
    pub build_release: u64,
    pub architecture: String,
    pub summary: String,
    pub description: String,
    pub source_id: String,
    pub homepage: String,
    pub licenses: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub providers: Vec<Provider>,
    pub uri: Option<String>,
    pub hash: Option<String>,
    pub download_size: Option<u64>,
}

#[derive(Debug, Default)]
struct Builder {
    name: Option<String>,
    version_identifier: Option<String>,
    source_release: Option<u64>,
    build_release: Option<u64>,
    architecture: Option<String>,
    summary: String,
    description: String,
    source_id: Option<String>,
    homepage: String,
    licenses: Vec<String>,
    dependencies: Vec<Dependency>,
    providers: Vec<Provider>,
    uri: Option<String>,
    hash: Option<String>,
    download_size: Option<u64>,
}

impl Meta {
    /// Materializes a catalog row from the sequence of `(tag, value)` records
    /// a stone archive's Meta payload carries for a single package, computing
    /// `id()` from the resulting fields.
    pub fn from_stone_payload(records: &[StonePayloadMeta]) -> Result<(Id, Self), MissingMetaError> {
        let mut builder = Builder::default();

        for record in records {
            match (&record.tag, &record.kind) {
                (StonePayloadMetaTag::Name, StonePayloadMetaKind::String(s)) => builder.name = Some(s.clone()),
                (StonePayloadMetaTag::Version, StonePayloadMetaKind::String(s)) => {
                    builder.version_identifier = Some(s.clone())
                }
                (StonePayloadMetaTag::Release, StonePayloadMetaKind::Uint64(n)) => builder.source_release = Some(*n),
                (StonePayloadMetaTag::BuildRelease, StonePayloadMetaKind::Uint64(n)) => {
                    builder.build_release = Some(*n)
                }
                (StonePayloadMetaTag::Architecture, StonePayloadMetaKind::String(s)) => {
                    builder.architecture = Some(s.clone())
                }
                (StonePayloadMetaTag::Summary, StonePayloadMetaKind::String(s)) => builder.summary = s.clone(),
                (StonePayloadMetaTag::Description, StonePayloadMetaKind::String(s)) => {
                    builder.description = s.clone()
                }
                (StonePayloadMetaTag::SourceID, StonePayloadMetaKind::String(s)) => builder.source_id = Some(s.clone()),
                (StonePayloadMetaTag::Homepage, StonePayloadMetaKind::String(s)) => builder.homepage = s.clone(),
                (StonePayloadMetaTag::License, StonePayloadMetaKind::String(s)) => builder.licenses.push(s.clone()),
                (StonePayloadMetaTag::Depends, StonePayloadMetaKind::Dependency(kind, s))
                | (StonePayloadMetaTag::BuildDepends, StonePayloadMetaKind::Dependency(kind, s)) => {
                    builder.dependencies.push(Dependency::new(Kind::from(*kind), s.clone()))
                }
                (StonePayloadMetaTag::Provides, StonePayloadMetaKind::Provider(kind, s)) => {
                    builder.providers.push(Provider::new(Kind::from(*kind), s.clone()))
                }
                (StonePayloadMetaTag::PackageURI, StonePayloadMetaKind::String(s)) => builder.uri = Some(s.clone()),
                (StonePayloadMetaTag::PackageHash, StonePayloadMetaKind::String(s)) => builder.hash = Some(s.clone()),
                (StonePayloadMetaTag::PackageSize, StonePayloadMetaKind::Uint64(n)) => {
                    builder.download_size = Some(*n)
                }
                // Conflicts and any tag this reader doesn't recognize are tolerated and ignored.
                (StonePayloadMetaTag::Conflicts | StonePayloadMetaTag::Unknown, _) => {}
                _ => {}
            }
        }

        let meta = Meta {
            name: builder.name.ok_or(MissingMetaError::Field("name"))?,
            version_identifier: builder.version_identifier.ok_or(MissingMetaError::Field("version"))?,
            source_release: builder.source_release.ok_or(MissingMetaError::Field("release"))?,
            build_release: builder.build_release.unwrap_or_default(),
            architecture: builder.architecture.ok_or(MissingMetaError::Field("architecture"))?,
            summary: builder.summary,
            description: builder.description,
            source_id: builder.source_id.ok_or(MissingMetaError::Field("source-id"))?,
            homepage: builder.homepage,
            licenses: builder.licenses,
            dependencies: builder.dependencies,
            providers: builder.providers,
            uri: builder.uri,
            hash: builder.hash.clone(),
            download_size: builder.download_size,
        };

        let id = builder.hash.map(Id).unwrap_or_else(|| meta.computed_id());

        Ok((id, meta))
    }

    /// A stable identifier derived from the fields that determine package
    /// identity, used when no explicit content hash (`PackageHash`) is
    /// available - e.g. for locally-built or installed entries.
    fn computed_id(&self) -> Id {
        let canonical = format!(
            "{}\0{}\0{}\0{}\0{}\0{}",
            self.name, self.version_identifier, self.source_release, self.build_release, self.architecture, self.source_id
        );
        Id(hex::encode(xxh3_128(canonical.as_bytes()).to_be_bytes()))
    }

    /// Every stored entry implicitly provides its own name, in addition to
    /// whatever it explicitly declares.
    pub fn all_providers(&self) -> impl Iterator<Item = Provider> + '_ {
        std::iter::once(Provider::name(self.name.clone())).chain(self.providers.iter().cloned())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MissingMetaError {
    #[error("missing required meta field: {0}")]
    Field(&'static str),
}

/// Projection returned by `MetaDB::info`; never fails, defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemInfo {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub source_release: u64,
    pub version: String,
    pub homepage: String,
    pub licenses: Vec<String>,
}

impl From<&Meta> for ItemInfo {
    fn from(meta: &Meta) -> Self {
        Self {
            name: meta.name.clone(),
            summary: meta.summary.clone(),
            description: meta.description.clone(),
            source_release: meta.source_release,
            version: meta.version_identifier.clone(),
            homepage: meta.homepage.clone(),
            licenses: meta.licenses.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use stone::StonePayloadMetaDependency;

    use super::*;

    fn record(tag: StonePayloadMetaTag, kind: StonePayloadMetaKind) -> StonePayloadMeta {
        StonePayloadMeta { tag, kind }
    }

    #[test]
    fn builds_meta_from_records() {
        let records = vec![
            record(StonePayloadMetaTag::Name, StonePayloadMetaKind::String("bash".into())),
            record(StonePayloadMetaTag::Version, StonePayloadMetaKind::String("5.2".into())),
            record(StonePayloadMetaTag::Release, StonePayloadMetaKind::Uint64(1)),
            record(StonePayloadMetaTag::Architecture, StonePayloadMetaKind::String("x86_64".into())),
            record(StonePayloadMetaTag::SourceID, StonePayloadMetaKind::String("bash".into())),
            record(
                StonePayloadMetaTag::Provides,
                StonePayloadMetaKind::Provider(StonePayloadMetaDependency::Binary, "bash".into()),
            ),
        ];

        let (id, meta) = Meta::from_stone_payload(&records).expect("builds");
        assert_eq!(meta.name, "bash");
        assert_eq!(meta.source_release, 1);
        assert!(!id.0.is_empty());

        // Deterministic: same inputs -> same pkgID
        let (id2, _) = Meta::from_stone_payload(&records).expect("builds");
        assert_eq!(id, id2);
    }

    #[test]
    fn explicit_hash_wins_over_computed_id() {
        let records = vec![
            record(StonePayloadMetaTag::Name, StonePayloadMetaKind::String("bash".into())),
            record(StonePayloadMetaTag::Version, StonePayloadMetaKind::String("5.2".into())),
            record(StonePayloadMetaTag::Release, StonePayloadMetaKind::Uint64(1)),
            record(StonePayloadMetaTag::Architecture, StonePayloadMetaKind::String("x86_64".into())),
            record(StonePayloadMetaTag::SourceID, StonePayloadMetaKind::String("bash".into())),
            record(
                StonePayloadMetaTag::PackageHash,
                StonePayloadMetaKind::String("deadbeef".into()),
            ),
        ];

        let (id, _) = Meta::from_stone_payload(&records).expect("builds");
        assert_eq!(id, Id::from("deadbeef"));
    }

    #[test]
    fn missing_name_is_rejected() {
        let records = vec![record(
            StonePayloadMetaTag::Version,
            StonePayloadMetaKind::String("5.2".into()),
        )];

        assert!(Meta::from_stone_payload(&records).is_err());
    }
}
