//! Ctrl+C handling.
//!
//! A single `AtomicBool` is shared between the signal hook, the tree scanner
//! and the rematerializer. Both phases check it between files or groups and
//! fail with an `Interrupted` error once it is set; whatever was already
//! written to the destination stays there.
//!
//! ```rust,no_run
//! use libc_unify::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//! let flag = handler.get_flag();
//! // pass `flag` to ScanConfig / MaterializeConfig
//! # let _ = flag;
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag set when Ctrl+C is received.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was pressed or `request_shutdown()` was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request a shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the flag for passing to scan and materialize configs.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag so a handler can be reused within one process.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install a Ctrl+C handler that sets the shutdown flag on interrupt.
///
/// Calling this more than once (for example from tests that drive
/// `run_app`) returns the already-installed handler with its flag cleared.
/// If another Ctrl+C hook already owns the process, an unhooked handler is
/// returned instead: it still honors [`ShutdownHandler::request_shutdown`]
/// but Ctrl+C will not reach it.
///
/// # Errors
///
/// Does not fail when a foreign hook is present; see above. The error type
/// is kept for callers that match on [`SignalError`].
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Stopping...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(e) => Ok(unhooked_handler(&e)),
    }
}

/// Handler used when the Ctrl+C hook could not be registered.
fn unhooked_handler(error: &ctrlc::Error) -> ShutdownHandler {
    if let Some(existing) = GLOBAL_HANDLER.get() {
        existing.reset();
        return existing.clone();
    }

    log::debug!("Ctrl+C hook unavailable ({error}), using unhooked handler");
    let fallback = ShutdownHandler::new();
    let _ = GLOBAL_HANDLER.set(fallback.clone());
    GLOBAL_HANDLER.get().cloned().unwrap_or(fallback)
}
