//! Top-level error type and exit codes.

use serde::Serialize;

use crate::duplicates::FinderError;
use crate::materialize::MaterializeError;

/// Exit codes for the libc-unify binary.
///
/// - 0: Success (destination tree written)
/// - 1: General error (any scan, materialize, config or argument failure)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the destination tree was fully written.
    Success = 0,
    /// General error: the run failed.
    GeneralError = 1,
    /// Interrupted: the run was stopped by the user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Pick the exit code for an error returned by `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<UnifyError>() {
            Some(e) if e.is_interrupted() => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Failure of a whole unify run.
#[derive(thiserror::Error, Debug)]
pub enum UnifyError {
    /// Scanning the source tree failed.
    #[error(transparent)]
    Scan(#[from] FinderError),

    /// Writing the destination tree failed.
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

impl UnifyError {
    /// Whether the run stopped because the user pressed Ctrl+C.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Scan(FinderError::Interrupted) | Self::Materialize(MaterializeError::Interrupted)
        )
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
