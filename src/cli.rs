//! Command-line interface definitions for libc-unify.
//!
//! # Example
//!
//! ```bash
//! # Unify full installs
//! libc-unify /tmp/glibc-installs /tmp/glibc-unified
//!
//! # Only keep headers, report the summary as JSON
//! libc-unify --headers-only --format json /tmp/glibc-installs /tmp/headers
//!
//! # Verbose mode for debugging
//! libc-unify -vv /tmp/glibc-installs /tmp/glibc-unified
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Unify multi-architecture C library installs.
///
/// Byte-identical files (with the same executable bit) across the inputs are
/// stored once under `common/` and replaced by relative symlinks. Every
/// written file gets a normalized mode and timestamp.
#[derive(Debug, Parser)]
#[command(name = "libc-unify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory where the per-architecture installs are extracted
    #[arg(value_name = "SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Directory to write the unified tree to (created if absent)
    #[arg(value_name = "DEST_DIR")]
    pub dest_dir: PathBuf,

    /// Only process header files (each input's usr/include)
    #[arg(long)]
    pub headers_only: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors and the summary
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Number of I/O threads for hashing [default: 4]
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH", env = "LIBC_UNIFY_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Format of the summary written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `copied C files; symlinked S files to D common files`
    Text,
    /// `{"copied":C,"symlinked":S,"common":D}`
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
