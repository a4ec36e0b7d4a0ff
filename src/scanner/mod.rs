//! Scanner module for input discovery, traversal and fingerprinting.
//!
//! This module provides functionality for:
//! - Finding the per-architecture inputs under a source root
//! - Sorted directory walking using jwalk
//! - Content fingerprinting with SHA-256
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`inputs`]: One input per immediate subdirectory of the source root
//! - [`walker`]: Directory traversal and regular-file discovery
//! - [`hasher`]: Streaming `exec_flag || contents` digests
//!
//! Grouping fingerprints into an index lives in [`crate::duplicates`].
//!
//! # Example
//!
//! ```no_run
//! use libc_unify::scanner::{discover_inputs, Walker};
//! use std::path::Path;
//!
//! let inputs = discover_inputs(Path::new("/tmp/glibc"), true).unwrap();
//! for input in &inputs {
//!     if let Some(root) = &input.scan_root {
//!         for entry in Walker::new(root).walk() {
//!             println!("{}", entry.unwrap().path.display());
//!         }
//!     }
//! }
//! ```

pub mod hasher;
pub mod inputs;
pub mod walker;

use std::io;
use std::path::PathBuf;

// Re-export main types
pub use hasher::{is_executable, Fingerprint, Hasher, CHUNK_SIZE};
pub use inputs::{discover_inputs, Input, HEADERS_SUBPATH};
pub use walker::Walker;

/// A regular file discovered during traversal.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Absolute path to the file (or to the symlink that resolves to it)
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Whether this entry is a symbolic link to a regular file
    pub is_symlink: bool,
}

impl FileEntry {
    /// Create a new FileEntry for a plain regular file.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            is_symlink: false,
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Fingerprinting a discovered file failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ScanError {
    /// Classify an I/O error for `path`.
    pub(crate) fn from_io(path: impl Into<PathBuf>, error: io::Error) -> Self {
        let path = path.into();
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &std::path::Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
