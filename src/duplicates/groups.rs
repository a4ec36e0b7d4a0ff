//! Fingerprint grouping.
//!
//! # Overview
//!
//! The [`FingerprintIndex`] maps each [`Fingerprint`] to the set of paths
//! (relative to the source root) whose content produced it. Both levels are
//! ordered collections, so iteration is in ascending fingerprint order and
//! each group's paths come out lexicographically sorted regardless of the
//! order in which files were hashed.
//!
//! # Example
//!
//! ```
//! use libc_unify::duplicates::FingerprintIndex;
//! use libc_unify::scanner::Fingerprint;
//! use std::path::PathBuf;
//!
//! let fp = Fingerprint::from_bytes([7; 32]);
//! let mut index = FingerprintIndex::new();
//! index.insert(fp, PathBuf::from("armv7/usr/lib/libc.so"));
//! index.insert(fp, PathBuf::from("aarch64/usr/lib/libc.so"));
//!
//! let group = index.groups().next().unwrap();
//! assert!(group.is_shared());
//! assert_eq!(
//!     group.representative(),
//!     Some(&PathBuf::from("aarch64/usr/lib/libc.so"))
//! );
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::scanner::Fingerprint;

/// Paths that share one fingerprint, in lexicographic order.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintGroup<'a> {
    /// Shared content fingerprint
    pub fingerprint: &'a Fingerprint,
    paths: &'a BTreeSet<PathBuf>,
}

impl<'a> FingerprintGroup<'a> {
    /// Member paths relative to the source root, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &'a PathBuf> + 'a {
        self.paths.iter()
    }

    /// Number of member paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the group has no members. Never true for groups from an index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether two or more paths share this content.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.paths.len() > 1
    }

    /// The lexicographically first path, whose bytes get copied.
    #[must_use]
    pub fn representative(&self) -> Option<&'a PathBuf> {
        self.paths.first()
    }
}

/// Mapping from fingerprint to the relative paths sharing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintIndex {
    groups: BTreeMap<Fingerprint, BTreeSet<PathBuf>>,
}

impl FingerprintIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` under `fingerprint`.
    ///
    /// Returns `false` if the path was already recorded for that fingerprint.
    pub fn insert(&mut self, fingerprint: Fingerprint, path: PathBuf) -> bool {
        self.groups.entry(fingerprint).or_default().insert(path)
    }

    /// Groups in ascending fingerprint order.
    pub fn groups(&self) -> impl Iterator<Item = FingerprintGroup<'_>> {
        self.groups
            .iter()
            .map(|(fingerprint, paths)| FingerprintGroup { fingerprint, paths })
    }

    /// Look up the fingerprint recorded for a relative path.
    #[must_use]
    pub fn fingerprint_of(&self, path: &Path) -> Option<&Fingerprint> {
        self.groups
            .iter()
            .find(|(_, paths)| paths.contains(path))
            .map(|(fp, _)| fp)
    }

    /// Number of distinct fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no files were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of recorded paths across all groups.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    /// Number of groups with two or more members.
    #[must_use]
    pub fn shared_groups(&self) -> usize {
        self.groups.values().filter(|paths| paths.len() > 1).count()
    }
}

impl Extend<(Fingerprint, PathBuf)> for FingerprintIndex {
    fn extend<T: IntoIterator<Item = (Fingerprint, PathBuf)>>(&mut self, iter: T) {
        for (fingerprint, path) in iter {
            self.insert(fingerprint, path);
        }
    }
}

impl FromIterator<(Fingerprint, PathBuf)> for FingerprintIndex {
    fn from_iter<T: IntoIterator<Item = (Fingerprint, PathBuf)>>(iter: T) -> Self {
        let mut index = Self::new();
        index.extend(iter);
        index
    }
}

/// Statistics from a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Inputs found under the source root
    pub inputs: usize,
    /// Inputs that had a scan root (all of them unless headers-only)
    pub scanned_inputs: usize,
    /// Regular files fingerprinted
    pub total_files: usize,
    /// Bytes read across all files
    pub total_size: u64,
    /// Distinct fingerprints
    pub unique_fingerprints: usize,
    /// Fingerprints shared by two or more paths
    pub shared_groups: usize,
    /// Bytes that would be stored more than once without deduplication
    pub reclaimable_bytes: u64,
}
