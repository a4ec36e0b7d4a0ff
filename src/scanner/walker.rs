//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing one scan root
//! and yielding every regular file under it, in name-sorted order.
//!
//! # Symlink Policy
//!
//! - Directory symlinks are never followed, so a link cycle cannot make the
//!   walk loop and no file is reached through two different roots.
//! - File symlinks are followed: the entry is reported with the link's own
//!   path and later hashed and copied as the target's content.
//! - A dangling symlink is an error, like any other unreadable file.
//! - Sockets, FIFOs and device nodes are skipped.
//!
//! # Example
//!
//! ```no_run
//! use libc_unify::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/tmp/glibc/aarch64"));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{FileEntry, ScanError};

/// Directory walker for sorted regular-file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use libc_unify::scanner::Walker;
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."));
    /// ```
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            root: path.to_path_buf(),
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    /// Callers must check the flag afterwards to tell an interrupted walk from
    /// a complete one.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding regular files.
    ///
    /// Errors are yielded as [`ScanError`] values; the caller decides whether
    /// to stop. Children of each directory are visited in file-name order so
    /// the sequence is stable across runs.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .map_while(move |entry_result| {
                // Check shutdown flag periodically
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return None;
                }
                Some(entry_result)
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    // Skip the root directory itself
                    if path == self.root {
                        return None;
                    }

                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }

                    if file_type.is_symlink() {
                        return self.resolve_symlink(path);
                    }

                    if !file_type.is_file() {
                        log::trace!("Skipping special file: {}", path.display());
                        return None;
                    }

                    match entry.metadata() {
                        Ok(metadata) => Some(Ok(FileEntry::new(path, metadata.len()))),
                        Err(e) => Some(Err(self.handle_jwalk_error(path, e))),
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(self.handle_jwalk_error(path, e)))
                }
            })
    }

    /// Apply the symlink policy to a link found during traversal.
    fn resolve_symlink(&self, path: PathBuf) -> Option<Result<FileEntry, ScanError>> {
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Cannot resolve symlink {}: {}", path.display(), e);
                return Some(Err(ScanError::from_io(path, e)));
            }
        };

        if metadata.is_dir() {
            log::debug!("Not following directory symlink: {}", path.display());
            return None;
        }
        if !metadata.is_file() {
            log::trace!("Skipping symlink to special file: {}", path.display());
            return None;
        }

        log::trace!("Following file symlink: {}", path.display());
        Some(Ok(FileEntry {
            path,
            size: metadata.len(),
            is_symlink: true,
        }))
    }

    /// Handle jwalk errors.
    fn handle_jwalk_error(&self, path: PathBuf, error: jwalk::Error) -> ScanError {
        log::warn!("Walker error for {}: {}", path.display(), error);
        match error.io_error().map(std::io::Error::kind) {
            Some(kind) => ScanError::from_io(path, std::io::Error::new(kind, error.to_string())),
            None => ScanError::Io {
                path,
                source: std::io::Error::other(error.to_string()),
            },
        }
    }
}
