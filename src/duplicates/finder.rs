//! Tree scanner that turns a source root into a [`FingerprintIndex`].
//!
//! # Overview
//!
//! The scan runs in two steps:
//! 1. **Walk** - Discover inputs and collect every regular file under each
//!    scan root (sequential, name-sorted)
//! 2. **Hash** - Fingerprint all files on a bounded rayon pool and fold the
//!    results into an ordered index
//!
//! Hashing completion order never leaks into the result: the index is built
//! from ordered maps, so two scans of the same tree are identical.
//!
//! # Example
//!
//! ```no_run
//! use libc_unify::duplicates::{ScanConfig, TreeScanner};
//! use std::path::Path;
//!
//! let scanner = TreeScanner::new(ScanConfig::default().with_headers_only(true));
//! let (index, summary) = scanner.scan(Path::new("/tmp/glibc")).unwrap();
//! println!(
//!     "{} files, {} distinct, {} shared",
//!     summary.total_files, summary.unique_fingerprints, summary.shared_groups
//! );
//! # let _ = index;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use super::groups::{FingerprintIndex, ScanSummary};
use crate::progress::ProgressCallback;
use crate::scanner::{discover_inputs, FileEntry, Fingerprint, Hasher, Input, ScanError, Walker};

/// Configuration for a tree scan.
#[derive(Clone)]
pub struct ScanConfig {
    /// Restrict each input to its `usr/include` subtree.
    pub headers_only: bool,
    /// Number of I/O threads for parallel hashing.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("headers_only", &self.headers_only)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            headers_only: false,
            io_threads: 4,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ScanConfig {
    /// Only scan `usr/include` beneath each input.
    #[must_use]
    pub fn with_headers_only(mut self, headers_only: bool) -> Self {
        self.headers_only = headers_only;
        self
    }

    /// Set the number of hashing threads (at least one).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

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

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Errors that abort a scan.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The hashing thread pool could not be created.
    #[error("Failed to create hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A file or directory could not be read.
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// A discovered file awaiting its fingerprint.
struct PendingFile {
    relative: PathBuf,
    entry: FileEntry,
}

/// Walks every input under a source root and groups files by fingerprint.
#[derive(Debug, Default)]
pub struct TreeScanner {
    config: ScanConfig,
    hasher: Hasher,
}

impl TreeScanner {
    /// Create a scanner with the given configuration.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            hasher: Hasher::new(),
        }
    }

    /// Create a scanner with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ScanConfig::default())
    }

    /// Scan `source_root` and return the fingerprint index with statistics.
    ///
    /// Paths in the index are relative to `source_root`, e.g.
    /// `armv7/usr/include/stdio.h`.
    ///
    /// # Errors
    ///
    /// Any unreadable directory or file aborts the scan. There is no partial
    /// result.
    pub fn scan(
        &self,
        source_root: &Path,
    ) -> Result<(FingerprintIndex, ScanSummary), FinderError> {
        let inputs = discover_inputs(source_root, self.config.headers_only)?;
        let mut summary = ScanSummary {
            inputs: inputs.len(),
            ..Default::default()
        };

        let files = self.collect_files(source_root, &inputs, &mut summary)?;
        let hashed = self.hash_files(files)?;

        let mut index = FingerprintIndex::new();
        let mut sizes: HashMap<Fingerprint, u64> = HashMap::new();
        for (fingerprint, relative, size) in hashed {
            summary.total_size += size;
            sizes.insert(fingerprint, size);
            index.insert(fingerprint, relative);
        }

        summary.total_files = index.total_files();
        summary.unique_fingerprints = index.len();
        summary.shared_groups = index.shared_groups();
        summary.reclaimable_bytes = index
            .groups()
            .filter(|g| g.is_shared())
            .map(|g| {
                let size = sizes.get(g.fingerprint).copied().unwrap_or(0);
                size * (g.len() as u64 - 1)
            })
            .sum();

        log::info!(
            "Scanned {} files in {} inputs: {} distinct, {} shared",
            summary.total_files,
            summary.scanned_inputs,
            summary.unique_fingerprints,
            summary.shared_groups
        );

        Ok((index, summary))
    }

    /// Walk each input's scan root and collect regular files.
    fn collect_files(
        &self,
        source_root: &Path,
        inputs: &[Input],
        summary: &mut ScanSummary,
    ) -> Result<Vec<PendingFile>, FinderError> {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_start("walking", 0);
        }

        let mut files = Vec::new();
        for input in inputs {
            let Some(scan_root) = &input.scan_root else {
                continue;
            };
            summary.scanned_inputs += 1;
            log::debug!("Walking input {}", scan_root.display());

            let mut walker = Walker::new(scan_root);
            if let Some(ref flag) = self.config.shutdown_flag {
                walker = walker.with_shutdown_flag(Arc::clone(flag));
            }

            for entry in walker.walk() {
                let entry = entry?;
                let relative = relative_to(source_root, &entry.path)?;
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_progress(files.len() + 1, &relative.to_string_lossy());
                }
                files.push(PendingFile { relative, entry });
            }

            if self.config.is_shutdown_requested() {
                return Err(FinderError::Interrupted);
            }
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_end("walking");
        }
        log::debug!("Discovered {} files", files.len());

        Ok(files)
    }

    /// Fingerprint all files on a bounded thread pool.
    fn hash_files(
        &self,
        files: Vec<PendingFile>,
    ) -> Result<Vec<(Fingerprint, PathBuf, u64)>, FinderError> {
        if files.is_empty() {
            log::debug!("No files to hash");
            return Ok(Vec::new());
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_start("hashing", files.len());
        }

        // Build a custom thread pool with limited parallelism for I/O
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .build()?;

        let processed = AtomicUsize::new(0);
        let results = pool.install(|| {
            files
                .into_par_iter()
                .map(|PendingFile { relative, entry }| {
                    if self.config.is_shutdown_requested() {
                        return Err(FinderError::Interrupted);
                    }

                    let fingerprint = self
                        .hasher
                        .fingerprint(&entry.path)
                        .map_err(ScanError::from)?;
                    log::trace!("{} {}", fingerprint, relative.display());

                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref cb) = self.config.progress_callback {
                        cb.on_progress(done, &relative.to_string_lossy());
                        cb.on_item_completed(entry.size);
                    }

                    Ok((fingerprint, relative, entry.size))
                })
                .collect::<Result<Vec<_>, FinderError>>()
        })?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_end("hashing");
        }

        Ok(results)
    }
}

/// Express `path` relative to `root`.
fn relative_to(root: &Path, path: &Path) -> Result<PathBuf, ScanError> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| ScanError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(format!("path is outside {}", root.display())),
        })
}
