//! SHA-256 content fingerprints with streaming reads.
//!
//! # Overview
//!
//! A [`Fingerprint`] is the digest of a one-byte executable flag followed by
//! the full file contents. Two files only share a fingerprint when both their
//! bytes and their owner-execute bit agree, so a deduplicated copy can always
//! be given the right mode.
//!
//! # Example
//!
//! ```no_run
//! use libc_unify::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let fp = hasher.fingerprint(Path::new("/usr/include/stdio.h")).unwrap();
//! println!("{} -> common/{}/{}", "stdio.h", fp.shard(), fp);
//! ```

use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::HashError;

/// Size of each read when streaming file contents into the digest.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Owner-execute permission bit (`S_IXUSR`).
pub const OWNER_EXEC_BIT: u32 = 0o100;

/// SHA-256 digest of `exec_flag || contents`.
///
/// Ordering is bytewise, which matches the ordering of the lowercase hex
/// rendering used for on-disk paths.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap a raw 32-byte digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full 64-character lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First two hex characters, used as the shard directory under `common/`.
    #[must_use]
    pub fn shard(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Whether the owner-execute bit is set in the given metadata.
///
/// Always `false` on platforms without Unix permission bits.
#[must_use]
pub fn is_executable(metadata: &Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & OWNER_EXEC_BIT != 0
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        false
    }
}

/// Streaming fingerprint calculator.
///
/// Reads files in [`CHUNK_SIZE`] pieces so memory use stays flat regardless
/// of file size.
#[derive(Debug, Clone)]
pub struct Hasher {
    chunk_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher using the standard 32 KiB chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Fingerprint the file at `path`.
    ///
    /// Symbolic links are followed: the mode and bytes of the link target are
    /// what get hashed.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be stat'ed, opened or read.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let metadata = fs::metadata(path).map_err(|e| HashError::from_io(path, e))?;
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;

        self.fingerprint_reader(is_executable(&metadata), file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Fingerprint arbitrary content with an explicit executable flag.
    ///
    /// # Errors
    ///
    /// Propagates any read error from `reader`.
    pub fn fingerprint_reader<R: Read>(
        &self,
        executable: bool,
        mut reader: R,
    ) -> io::Result<Fingerprint> {
        let mut digest = Sha256::new();
        digest.update([u8::from(executable)]);

        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            digest.update(&buffer[..n]);
        }

        Ok(Fingerprint(digest.finalize().into()))
    }
}
