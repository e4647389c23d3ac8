// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

/// The content payload is a single opaque, potentially compressed blob. Its
/// body only records the byte offset at which the (still encoded) content
/// begins within the archive; [`crate::StoneReader::unpack_content`] streams
/// and decompresses it on demand rather than buffering it eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StonePayloadContent {
    pub offset: u64,
}
