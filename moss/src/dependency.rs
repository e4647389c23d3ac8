// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`Provider`] and [`Dependency`] are sum types over a fixed set of
//! capability kinds, each with a canonical `Display`/`FromStr` pair used as
//! the provider-index key. This replaces a stringly-typed "kind integer +
//! free string" pairing with a type that can't represent an invalid kind.

use std::{fmt, str::FromStr};

use stone::StonePayloadMetaDependency;

/// A capability kind shared by [`Provider`] (what a package offers) and
/// [`Dependency`] (what a package requires).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    PackageName,
    SharedLibrary,
    PkgConfig,
    Interpreter,
    CMake,
    BinaryName,
    SystemBinary,
    PkgConfig32,
}

impl Kind {
    fn prefix(self) -> &'static str {
        match self {
            Kind::PackageName => "name",
            Kind::SharedLibrary => "soname",
            Kind::PkgConfig => "pkgconfig",
            Kind::Interpreter => "interpreter",
            Kind::CMake => "cmake",
            Kind::BinaryName => "binary",
            Kind::SystemBinary => "sysbinary",
            Kind::PkgConfig32 => "pkgconfig32",
        }
    }
}

impl FromStr for Kind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "name" => Kind::PackageName,
            "soname" => Kind::SharedLibrary,
            "pkgconfig" => Kind::PkgConfig,
            "interpreter" => Kind::Interpreter,
            "cmake" => Kind::CMake,
            "binary" => Kind::BinaryName,
            "sysbinary" => Kind::SystemBinary,
            "pkgconfig32" => Kind::PkgConfig32,
            other => return Err(ParseError::UnknownKind(other.to_string())),
        };
        Ok(kind)
    }
}

/// Converts a dependency kind as carried by a stone archive's meta payload
/// into the capability [`Kind`] used by the catalog. `Python` has no
/// dedicated slot in the provider-index type set; it is folded into
/// `BinaryName` since a python module dependency behaves, for resolution
/// purposes, like any other named capability.
impl From<StonePayloadMetaDependency> for Kind {
    fn from(value: StonePayloadMetaDependency) -> Self {
        match value {
            StonePayloadMetaDependency::PackageName => Kind::PackageName,
            StonePayloadMetaDependency::SharedLibrary => Kind::SharedLibrary,
            StonePayloadMetaDependency::PkgConfig => Kind::PkgConfig,
            StonePayloadMetaDependency::Interpreter => Kind::Interpreter,
            StonePayloadMetaDependency::CMake => Kind::CMake,
            StonePayloadMetaDependency::Python => Kind::BinaryName,
            StonePayloadMetaDependency::Binary => Kind::BinaryName,
            StonePayloadMetaDependency::SystemBinary => Kind::SystemBinary,
            StonePayloadMetaDependency::PkgConfig32 => Kind::PkgConfig32,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown capability kind: {0}")]
    UnknownKind(String),
}

macro_rules! capability_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            pub kind: Kind,
            pub identifier: String,
        }

        impl $name {
            pub fn new(kind: Kind, identifier: impl Into<String>) -> Self {
                Self {
                    kind,
                    identifier: identifier.into(),
                }
            }

            pub fn name(identifier: impl Into<String>) -> Self {
                Self::new(Kind::PackageName, identifier)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.kind == Kind::PackageName {
                    f.write_str(&self.identifier)
                } else {
                    write!(f, "{}({})", self.kind.prefix(), self.identifier)
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if let Some(rest) = s.strip_suffix(')') {
                    if let Some((prefix, identifier)) = rest.split_once('(') {
                        let kind = prefix.parse()?;
                        return Ok(Self::new(kind, identifier));
                    }
                }

                Ok(Self::name(s))
            }
        }
    };
}

capability_type!(Provider, "A capability a package offers (`name`, `pkgconfig(foo)`, a shared-library soname, ...).");
capability_type!(Dependency, "A capability a package requires; same shape as `Provider`.");

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn package_name_stringifies_plain() {
        let p = Provider::name("bash");
        assert_eq!(p.to_string(), "bash");
    }

    #[test]
    fn typed_provider_roundtrip() {
        let p = Provider::new(Kind::SharedLibrary, "libfoo.so.1");
        assert_eq!(p.to_string(), "soname(libfoo.so.1)");

        let parsed: Provider = p.to_string().parse().unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn package_name_parse_roundtrip() {
        let p = Provider::name("bash");
        let parsed: Provider = p.to_string().parse().unwrap();
        assert_eq!(parsed, p);
    }
}
