//! Rematerialization of a fingerprint index into a destination tree.
//!
//! This module provides functionality for:
//! - Copying files whose content is unique to their mirrored location
//! - Storing shared content once under `common/` ([`layout`])
//! - Replacing every shared member with a relative symlink
//! - Normalizing mode and timestamps of every physical file ([`normalize`])
//!
//! Groups are processed one at a time in ascending fingerprint order, so the
//! counters, the log and the choice of representative are the same on every
//! run.
//!
//! # Failure
//!
//! There is no rollback. A failed run can leave a partially written
//! destination; callers should treat the destination as scratch space and
//! pass an empty or absent directory.
//!
//! # Example
//!
//! ```no_run
//! use libc_unify::duplicates::TreeScanner;
//! use libc_unify::materialize::Rematerializer;
//! use std::path::Path;
//!
//! let source = Path::new("/tmp/glibc");
//! let (index, _) = TreeScanner::with_defaults().scan(source).unwrap();
//! let summary = Rematerializer::with_defaults()
//!     .materialize(&index, source, Path::new("/tmp/glibc-unified"))
//!     .unwrap();
//! println!("{summary}");
//! ```

pub mod layout;
pub mod normalize;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::duplicates::{FingerprintGroup, FingerprintIndex};
use crate::progress::ProgressCallback;

pub use layout::{common_rel_path, symlink_target, COMMON_DIR};
pub use normalize::{normalize_file, normalized_mode, NORMALIZED_TIME};

/// Errors that abort rematerialization.
#[derive(thiserror::Error, Debug)]
pub enum MaterializeError {
    /// The run was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Materialization interrupted by user")]
    Interrupted,

    /// A directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A file could not be copied.
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        /// Source file
        from: PathBuf,
        /// Destination file
        to: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A symbolic link could not be created.
    #[error("Failed to symlink {link} -> {target}: {source}")]
    Symlink {
        /// Location of the link
        link: PathBuf,
        /// Relative target of the link
        target: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Mode or timestamps could not be normalized.
    #[error("Failed to normalize {path}: {source}")]
    Normalize {
        /// File being normalized
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The destination already holds an entry of an incompatible type.
    #[error("Destination path is occupied by a directory: {0}")]
    Occupied(PathBuf),
}

/// Counts reported after a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeSummary {
    /// Files whose content is unique, copied directly
    pub copied: usize,
    /// Symlinks created across all shared groups
    pub symlinked: usize,
    /// Distinct shared files stored under `common/`
    pub common: usize,
}

impl fmt::Display for MaterializeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copied {} files; symlinked {} files to {} common files",
            self.copied, self.symlinked, self.common
        )
    }
}

/// Configuration for rematerialization.
#[derive(Clone, Default)]
pub struct MaterializeConfig {
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for MaterializeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializeConfig")
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl MaterializeConfig {
    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Writes a deduplicated destination tree from a [`FingerprintIndex`].
#[derive(Debug, Default)]
pub struct Rematerializer {
    config: MaterializeConfig,
}

impl Rematerializer {
    /// Create a rematerializer with the given configuration.
    #[must_use]
    pub fn new(config: MaterializeConfig) -> Self {
        Self { config }
    }

    /// Create a rematerializer with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Write `index` into `dest_root`, reading content from `source_root`.
    ///
    /// Singleton groups are copied to their mirrored path. Shared groups are
    /// stored once at [`common_rel_path`] and every member becomes a relative
    /// symlink to it. An existing symlink at a member path is replaced; an
    /// existing regular file at a copy destination is overwritten.
    ///
    /// # Errors
    ///
    /// The first filesystem error aborts the run. Nothing already written is
    /// removed.
    pub fn materialize(
        &self,
        index: &FingerprintIndex,
        source_root: &Path,
        dest_root: &Path,
    ) -> Result<MaterializeSummary, MaterializeError> {
        create_dir_all(dest_root)?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_start("materializing", index.len());
        }

        let mut summary = MaterializeSummary::default();
        for (position, group) in index.groups().enumerate() {
            if self.config.is_shutdown_requested() {
                return Err(MaterializeError::Interrupted);
            }

            if group.is_shared() {
                self.materialize_shared(&group, source_root, dest_root, &mut summary)?;
            } else if let Some(path) = group.representative() {
                log::trace!("copying {}", path.display());
                copy_normalized(&source_root.join(path), &dest_root.join(path))?;
                summary.copied += 1;
            }

            if let Some(ref cb) = self.config.progress_callback {
                if let Some(path) = group.representative() {
                    cb.on_progress(position + 1, &path.to_string_lossy());
                }
            }
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_end("materializing");
        }

        log::info!(
            "Materialized {} direct copies, {} symlinks, {} common files into {}",
            summary.copied,
            summary.symlinked,
            summary.common,
            dest_root.display()
        );

        Ok(summary)
    }

    /// Store one shared copy and link every member to it.
    fn materialize_shared(
        &self,
        group: &FingerprintGroup<'_>,
        source_root: &Path,
        dest_root: &Path,
        summary: &mut MaterializeSummary,
    ) -> Result<(), MaterializeError> {
        let Some(representative) = group.representative() else {
            return Ok(());
        };

        let canonical = common_rel_path(group.fingerprint);
        log::trace!(
            "storing {} as {}",
            representative.display(),
            canonical.display()
        );
        copy_normalized(
            &source_root.join(representative),
            &dest_root.join(&canonical),
        )?;
        summary.common += 1;

        for member in group.paths() {
            let link = dest_root.join(member);
            let target = symlink_target(member, &canonical);
            log::trace!("symlinking {} -> {}", member.display(), target.display());

            ensure_parent(&link)?;
            replace_symlink(&target, &link)?;
            summary.symlinked += 1;
        }

        Ok(())
    }
}

fn create_dir_all(path: &Path) -> Result<(), MaterializeError> {
    fs::create_dir_all(path).map_err(|source| MaterializeError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<(), MaterializeError> {
    match path.parent() {
        Some(parent) => create_dir_all(parent),
        None => Ok(()),
    }
}

/// Copy `from` to `to` and normalize the result.
///
/// A symlink left at `to` is removed first so the copy never writes through
/// it into shared content.
fn copy_normalized(from: &Path, to: &Path) -> Result<(), MaterializeError> {
    ensure_parent(to)?;

    if let Ok(existing) = fs::symlink_metadata(to) {
        if existing.file_type().is_symlink() {
            fs::remove_file(to).map_err(|source| MaterializeError::Copy {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })?;
        } else if existing.is_dir() {
            return Err(MaterializeError::Occupied(to.to_path_buf()));
        }
    }

    fs::copy(from, to).map_err(|source| MaterializeError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;

    normalize_file(to).map_err(|source| MaterializeError::Normalize {
        path: to.to_path_buf(),
        source,
    })
}

/// Create `link -> target`, replacing an existing symlink at `link`.
fn replace_symlink(target: &Path, link: &Path) -> Result<(), MaterializeError> {
    let symlink_err = |source| MaterializeError::Symlink {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        source,
    };

    if let Ok(existing) = fs::symlink_metadata(link) {
        if existing.file_type().is_symlink() {
            fs::remove_file(link).map_err(symlink_err)?;
        } else if existing.is_dir() {
            return Err(MaterializeError::Occupied(link.to_path_buf()));
        } else {
            return Err(symlink_err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "a regular file is in the way",
            )));
        }
    }

    create_symlink(target, link).map_err(symlink_err)
}

fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(target, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are not supported on this platform",
        ))
    }
}
