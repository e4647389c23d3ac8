// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

pub use self::dependency::{Dependency, Provider};
pub use self::installation::Installation;
pub use self::package::{Id as PackageId, Meta};
pub use self::registry::Registry;

pub mod db;
pub mod dependency;
pub mod environment;
pub mod error;
pub mod fetch;
pub mod installation;
pub mod package;
pub mod registry;
