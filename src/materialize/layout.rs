//! Destination tree layout.
//!
//! Shared content lives at `common/<2-hex>/<64-hex>`; every other path
//! mirrors its location under the source root. Links into `common/` are
//! relative so the whole destination can be moved or archived as a unit.

use std::path::{Component, Path, PathBuf};

use crate::scanner::Fingerprint;

/// Top-level directory holding shared content.
pub const COMMON_DIR: &str = "common";

/// Content-addressed location of a shared file, relative to the destination.
///
/// # Example
///
/// ```
/// use libc_unify::materialize::common_rel_path;
/// use libc_unify::scanner::Fingerprint;
/// use std::path::PathBuf;
///
/// let fp = Fingerprint::from_bytes([0xab; 32]);
/// let expected = PathBuf::from("common").join("ab").join("ab".repeat(32));
/// assert_eq!(common_rel_path(&fp), expected);
/// ```
#[must_use]
pub fn common_rel_path(fingerprint: &Fingerprint) -> PathBuf {
    Path::new(COMMON_DIR)
        .join(fingerprint.shard())
        .join(fingerprint.to_hex())
}

/// Link target that reaches `canonical` from a link placed at `member`.
///
/// Both paths are relative to the destination root. One `..` is emitted per
/// directory level above `member`.
///
/// # Example
///
/// ```
/// use libc_unify::materialize::symlink_target;
/// use std::path::{Path, PathBuf};
///
/// let target = symlink_target(
///     Path::new("armv7/usr/lib/libc.so"),
///     Path::new("common/ab/abcd"),
/// );
/// assert_eq!(target, PathBuf::from("../../../common/ab/abcd"));
/// ```
#[must_use]
pub fn symlink_target(member: &Path, canonical: &Path) -> PathBuf {
    let depth = member
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
        .saturating_sub(1);

    let mut target = PathBuf::new();
    for _ in 0..depth {
        target.push("..");
    }
    target.push(canonical);
    target
}
