#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the TLSM decision engine.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tlsm_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! println!("approval timeout: {}s", resolved.config.engine.approval_timeout_secs);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **`TLSM_LOG`** environment variable, for `logging.level` only
//! 2. **Explicit** file passed with `--config`
//! 3. **User** (`~/.config/tlsm/config.toml` or the platform equivalent)
//! 4. **System** (`/etc/tlsm/config.toml`)
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other internal TLSM crates**.
//! Conversion into engine and telemetry types happens in the CLI.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigSources, ResolvedConfig};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(explicit)
    }

    /// Load configuration from a single file over the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
