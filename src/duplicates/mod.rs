//! Fingerprint grouping module.
//!
//! This module provides functionality for:
//! - Scanning every input under a source root ([`finder`])
//! - Grouping relative paths by content fingerprint ([`groups`])

pub mod finder;
pub mod groups;

pub use finder::{FinderError, ScanConfig, TreeScanner};
pub use groups::{FingerprintGroup, FingerprintIndex, ScanSummary};
