// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Network fetching and blob-pool placement live outside this subsystem;
//! these traits are the seam a plugin enqueues work through without
//! depending on any concrete HTTP client or cache implementation.

use std::path::PathBuf;

use url::Url;

/// One piece of work: copy `uri` to `destination`, expected to be
/// `expected_size` bytes once complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetchable {
    pub uri: Url,
    pub destination: PathBuf,
    pub expected_size: u64,
}

/// An abstract enqueue sink. Implementors own retry policy, concurrency, and
/// progress reporting; this subsystem only ever calls `enqueue`.
pub trait FetchContext {
    fn enqueue(&self, fetchable: Fetchable);
}

/// Content-addressed blob placement, keyed by hash.
pub trait CachePool {
    fn staging_path(&self, hash: &str) -> PathBuf;
    fn final_path(&self, hash: &str) -> PathBuf;
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, path::Path};

    use super::*;

    struct RecordingContext {
        seen: RefCell<Vec<Fetchable>>,
    }

    impl FetchContext for RecordingContext {
        fn enqueue(&self, fetchable: Fetchable) {
            self.seen.borrow_mut().push(fetchable);
        }
    }

    #[test]
    fn enqueue_records_fetchable() {
        let ctx = RecordingContext { seen: RefCell::new(vec![]) };

        ctx.enqueue(Fetchable {
            uri: "https://r/stone/foo.stone".parse().unwrap(),
            destination: Path::new("/tmp/staging/abc").into(),
            expected_size: 1024,
        });

        assert_eq!(ctx.seen.borrow().len(), 1);
        assert_eq!(ctx.seen.borrow()[0].expected_size, 1024);
    }
}
