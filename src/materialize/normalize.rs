//! Reproducible file metadata.
//!
//! After a copy the mode and timestamps still reflect the source file and the
//! wall clock. [`normalize_file`] rewrites them so the result depends only on
//! the content and the owner-execute bit.

use std::fs;
use std::io;
use std::path::Path;

use filetime::FileTime;

use crate::scanner::hasher::{is_executable, OWNER_EXEC_BIT};

/// Fixed access and modification time for every materialized file
/// (2021-01-01T12:00:00Z).
pub const NORMALIZED_TIME: i64 = 1_609_502_400;

/// Mode given to files with the owner-execute bit.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mode given to all other files.
pub const REGULAR_MODE: u32 = 0o644;

/// Normalized permission bits for an original mode.
///
/// Everything except the owner-execute bit is discarded, including setuid,
/// setgid and sticky bits.
#[must_use]
pub fn normalized_mode(mode: u32) -> u32 {
    if mode & OWNER_EXEC_BIT != 0 {
        EXECUTABLE_MODE
    } else {
        REGULAR_MODE
    }
}

/// Force `path` to its normalized mode and to [`NORMALIZED_TIME`].
///
/// Applying this twice leaves the file unchanged.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be stat'ed or updated.
pub fn normalize_file(path: &Path) -> io::Result<()> {
    let metadata = fs::metadata(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = normalized_mode(metadata.permissions().mode());
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let mut permissions = metadata.permissions();
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }

    let time = FileTime::from_unix_time(NORMALIZED_TIME, 0);
    filetime::set_file_times(path, time, time)?;

    log::trace!(
        "Normalized {} (executable: {})",
        path.display(),
        is_executable(&metadata)
    );
    Ok(())
}
