//! Discovery of per-architecture inputs under a source root.
//!
//! Every immediate subdirectory of the source root is one input (for example
//! `aarch64/`, `armv7/`, `x86_64/`). Plain files at that level are ignored, as
//! are symbolic links, since directory links are never followed.
//!
//! A symlinked input is skipped even when it points at a directory, unlike
//! a plain `is_dir()` check which would follow it. Put the real directory in
//! the source root to have it unified.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use super::ScanError;

/// Subpath scanned inside each input when only headers are wanted.
pub const HEADERS_SUBPATH: &str = "usr/include";

/// One architecture-specific install under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Directory name, e.g. `aarch64`
    pub name: OsString,
    /// Full path to the input directory
    pub path: PathBuf,
    /// Directory to walk, or `None` if the input contributes no files
    pub scan_root: Option<PathBuf>,
}

/// List the inputs under `source_root`, sorted by name.
///
/// In headers-only mode each input is narrowed to [`HEADERS_SUBPATH`]; an
/// input without that directory is kept but has no scan root.
///
/// # Errors
///
/// Fails if `source_root` is missing, is not a directory, or cannot be read.
pub fn discover_inputs(source_root: &Path, headers_only: bool) -> Result<Vec<Input>, ScanError> {
    let metadata = fs::metadata(source_root).map_err(|e| ScanError::from_io(source_root, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(source_root.to_path_buf()));
    }

    let read_dir = fs::read_dir(source_root).map_err(|e| ScanError::from_io(source_root, e))?;

    let mut inputs = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| ScanError::from_io(source_root, e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| ScanError::from_io(&path, e))?;

        if file_type.is_symlink() {
            log::debug!("Skipping symlinked input: {}", path.display());
            continue;
        }
        if !file_type.is_dir() {
            log::trace!("Ignoring non-directory entry: {}", path.display());
            continue;
        }

        let scan_root = if headers_only {
            let headers = path.join(HEADERS_SUBPATH);
            if headers.is_dir() {
                Some(headers)
            } else {
                log::debug!(
                    "Input {} has no {}, contributing no files",
                    path.display(),
                    HEADERS_SUBPATH
                );
                None
            }
        } else {
            Some(path.clone())
        };

        inputs.push(Input {
            name: entry.file_name(),
            path,
            scan_root,
        });
    }

    inputs.sort_by(|a, b| a.name.cmp(&b.name));
    log::debug!(
        "Found {} inputs under {}",
        inputs.len(),
        source_root.display()
    );

    Ok(inputs)
}
