//! Layered application configuration.
//!
//! Settings are merged with figment in this order, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `LIBC_UNIFY_*` environment variables (e.g. `LIBC_UNIFY_IO_THREADS=8`)
//! 4. CLI flags
//!
//! Only tuning knobs live here. What gets written to the destination tree
//! never depends on configuration.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "LIBC_UNIFY_";

/// Errors from loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or had the wrong type.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] figment::Error),

    /// A value parsed but is out of range.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Offending setting
        field: &'static str,
        /// What is wrong with it
        message: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of threads used for hashing.
    pub io_threads: usize,
    /// Show progress bars on stderr.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_threads: 4,
            progress: true,
        }
    }
}

impl Config {
    /// Build the layered figment without CLI overrides.
    ///
    /// `path` replaces the platform default config file when given.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(file) = path.map(Path::to_path_buf).or_else(Self::default_path) {
            figment = figment.merge(Toml::file(file));
        }

        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load configuration from file and environment.
    ///
    /// # Errors
    ///
    /// Fails if an explicit `path` is missing, a layer does not parse, or a
    /// value is out of range. A missing default config file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if !p.is_file() {
                return Err(ConfigError::NotFound(p.to_path_buf()));
            }
        }

        let config: Config = Self::figment(path).extract()?;
        config.validate()?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Apply CLI flag overrides on top of the loaded configuration.
    ///
    /// # Errors
    ///
    /// Fails if a CLI value is out of range.
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(threads) = cli.io_threads {
            self.io_threads = threads;
        }
        if cli.no_progress || cli.quiet {
            self.progress = false;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "io_threads",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Default platform-specific configuration file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "libc-unify", "libc-unify")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
