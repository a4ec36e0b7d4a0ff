//! libc-unify - Multi-arch C library tree unifier
//!
//! Takes a directory holding one extracted C library install per target
//! architecture and writes a single tree where byte-identical files (with
//! the same owner-execute bit) are stored once under `common/` and every
//! original location becomes a relative symlink to that copy. File modes
//! and timestamps are normalized so the output is reproducible.
//!
//! # Example
//!
//! ```no_run
//! use libc_unify::{unify, UnifyOptions};
//! use std::path::Path;
//!
//! let report = unify(
//!     Path::new("/tmp/glibc-installs"),
//!     Path::new("/tmp/glibc-unified"),
//!     &UnifyOptions::default().with_headers_only(true),
//! )
//! .unwrap();
//! println!("{}", report.materialize);
//! ```

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod materialize;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::duplicates::{ScanConfig, ScanSummary, TreeScanner};
use crate::error::{ExitCode, UnifyError};
use crate::materialize::{MaterializeConfig, MaterializeSummary, Rematerializer};
use crate::progress::{Progress, ProgressCallback};

/// Options for a library-level [`unify`] run.
#[derive(Clone, Default)]
pub struct UnifyOptions {
    scan: ScanConfig,
    materialize: MaterializeConfig,
}

impl std::fmt::Debug for UnifyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifyOptions")
            .field("scan", &self.scan)
            .field("materialize", &self.materialize)
            .finish()
    }
}

impl UnifyOptions {
    /// Only scan `usr/include` beneath each input.
    #[must_use]
    pub fn with_headers_only(mut self, headers_only: bool) -> Self {
        self.scan = self.scan.with_headers_only(headers_only);
        self
    }

    /// Number of threads used for hashing.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.scan = self.scan.with_io_threads(threads);
        self
    }

    /// Shutdown flag checked by both phases.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.scan = self.scan.with_shutdown_flag(Arc::clone(&flag));
        self.materialize = self.materialize.with_shutdown_flag(flag);
        self
    }

    /// Progress callback shared by both phases.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.scan = self.scan.with_progress_callback(Arc::clone(&callback));
        self.materialize = self.materialize.with_progress_callback(callback);
        self
    }
}

/// Result of a successful [`unify`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifyReport {
    /// What the scan found
    pub scan: ScanSummary,
    /// What was written
    pub materialize: MaterializeSummary,
}

/// Scan `source_root` completely, then write the unified tree to `dest_root`.
///
/// # Errors
///
/// Returns the first scan or materialization error. The destination may be
/// partially written when materialization fails.
pub fn unify(
    source_root: &Path,
    dest_root: &Path,
    options: &UnifyOptions,
) -> Result<UnifyReport, UnifyError> {
    log::info!(
        "Unifying {} into {}{}",
        source_root.display(),
        dest_root.display(),
        if options.scan.headers_only {
            " (headers only)"
        } else {
            ""
        }
    );

    let (index, scan) = TreeScanner::new(options.scan.clone()).scan(source_root)?;
    let rematerializer = Rematerializer::new(options.materialize.clone());
    let materialize = rematerializer.materialize(&index, source_root, dest_root)?;

    log::info!(
        "Read {} in {} files; deduplication saved {}",
        ByteSize::b(scan.total_size),
        scan.total_files,
        ByteSize::b(scan.reclaimable_bytes)
    );

    Ok(UnifyReport { scan, materialize })
}

/// Run the command-line application, printing the summary to stdout.
///
/// # Errors
///
/// Returns any configuration, signal-handler, scan or materialization error.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_output(cli, &mut out)
}

/// Run the command-line application, writing the summary to `out`.
///
/// # Errors
///
/// See [`run_app`].
pub fn run_with_output<W: Write>(cli: Cli, out: &mut W) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?.with_cli_overrides(&cli)?;
    let handler = signal::install_handler()?;

    let mut options = UnifyOptions::default()
        .with_headers_only(cli.headers_only)
        .with_io_threads(config.io_threads)
        .with_shutdown_flag(handler.get_flag());
    if config.progress {
        options = options.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let report = unify(&cli.source_dir, &cli.dest_dir, &options)?;

    match cli.format {
        OutputFormat::Text => writeln!(out, "{}", report.materialize),
        OutputFormat::Json => writeln!(
            out,
            "{}",
            serde_json::to_string(&report.materialize).context("Failed to serialize summary")?
        ),
    }
    .context("Failed to write summary")?;

    Ok(ExitCode::Success)
}
