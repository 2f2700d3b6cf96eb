//! Candidate index: a cheap size-based prefilter over files on disk.
//!
//! Cryptographic hashing is expensive; most candidate files can be ruled out
//! for a given witness by size alone. [`CandidateIndex`] groups the
//! filesystem inventory by exact byte size so the verifier only ever hashes
//! files that could plausibly match.

use std::collections::HashMap;
use std::path::PathBuf;

/// Groups candidate files by size. Built once per run from the downloads
/// inventory, then queried once per witness.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    by_size: HashMap<u64, Vec<PathBuf>>,
}

impl CandidateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: PathBuf, size: u64) {
        self.by_size.entry(size).or_default().push(path);
    }

    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, u64)>,
    {
        let mut index = Self::new();
        for (path, size) in entries {
            index.insert(path, size);
        }
        index
    }

    /// Candidate files whose size exactly matches `size`, in no particular
    /// order.
    pub fn candidates_for_size(&self, size: u64) -> &[PathBuf] {
        self.by_size.get(&size).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_size.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn distinct_sizes(&self) -> usize {
        self.by_size.len()
    }

    pub fn sizes(&self) -> impl Iterator<Item = u64> + '_ {
        self.by_size.keys().copied()
    }
}

/// Span witnesses need candidates for several distinct file sizes at once —
/// one per member. This bundles those lookups so the verifier's recursion
/// doesn't have to keep re-querying the index.
pub fn candidates_for_sizes<'a>(
    index: &'a CandidateIndex,
    sizes: &[u64],
) -> Vec<&'a [PathBuf]> {
    sizes.iter().map(|&size| index.candidates_for_size(size)).collect()
}
