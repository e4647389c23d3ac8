// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::io::{Read, Write};

use super::{Record, StonePayloadDecodeError, StonePayloadEncodeError};
use crate::ext::{ReadExt, WriteExt};

/// An index entry records offsets to unique files within the content
/// payload once decompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StonePayloadIndex {
    /// Start of the entry within the content payload
    pub start: u64,

    /// End pointer, subtract start for length
    pub end: u64,

    /// XXH3_128 hash
    pub digest: u128,
}

impl Record for StonePayloadIndex {
    fn decode<R: Read>(mut reader: R) -> Result<Self, StonePayloadDecodeError> {
        let start = reader.read_u64()?;
        let end = reader.read_u64()?;
        let digest = reader.read_u128()?;

        Ok(Self { start, end, digest })
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<(), StonePayloadEncodeError> {
        writer.write_u64(self.start)?;
        writer.write_u64(self.end)?;
        writer.write_u128(self.digest)?;
        Ok(())
    }

    fn size(&self) -> usize {
        size_of::<Self>()
    }
}
