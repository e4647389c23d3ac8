// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Tunable constants shared across the metadata/state subsystem.

/// Buffer size used when streaming a stone archive off disk
pub const FILE_READ_BUFFER_SIZE: usize = 16 * 1024;

/// Number of rows batched per KV write transaction during `load_from_index`,
/// to bound peak memory while still keeping the whole reload atomic (the
/// batching is internal to the single transaction, not a separate commit
/// per batch)
pub const DB_BATCH_SIZE: usize = 1000;
