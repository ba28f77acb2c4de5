//! Config file discovery and layered loading.
//!
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge `/etc/tlsm/config.toml` (system)
//! 3. Merge `<user config dir>/config.toml` (user)
//! 4. Merge the explicitly requested file, if any
//! 5. Apply `TLSM_LOG` to `logging.level`
//! 6. Deserialize and validate

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tlsm/config.toml";

/// Environment variable overriding `logging.level`.
pub const LOG_ENV_VAR: &str = "TLSM_LOG";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A merged configuration and the files it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: Config,
    /// Files merged over the defaults, in precedence order.
    pub loaded_files: Vec<String>,
}

/// Where the layered loader looks for files.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// System config file; `None` skips the layer.
    pub system: Option<PathBuf>,
    /// User config file; `None` skips the layer.
    pub user: Option<PathBuf>,
    /// Explicit config file. Unlike the other layers it must exist.
    pub explicit: Option<PathBuf>,
}

impl ConfigSources {
    /// The standard system and user locations plus an optional explicit file.
    #[must_use]
    pub fn standard(explicit: Option<&Path>) -> Self {
        Self {
            system: Some(PathBuf::from(SYSTEM_CONFIG_PATH)),
            user: user_config_path(),
            explicit: explicit.map(Path::to_path_buf),
        }
    }
}

/// The per-user config file, e.g. `~/.config/tlsm/config.toml` on Linux.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tlsm").map(|d| d.config_dir().join("config.toml"))
}

/// Load the configuration with the standard layer precedence.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, the explicit
/// file is missing, or the merged configuration fails validation.
pub fn load(explicit: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    load_from(
        &ConfigSources::standard(explicit),
        std::env::var(LOG_ENV_VAR).ok().as_deref(),
    )
}

/// Load the configuration from the given sources.
///
/// `log_override` replaces `logging.level` after merging.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, the explicit
/// file is missing, or the merged configuration fails validation.
pub fn load_from(sources: &ConfigSources, log_override: Option<&str>) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    for (layer, path) in [("system", &sources.system), ("user", &sources.user)] {
        let Some(path) = path else { continue };
        if let Some(overlay) = try_load_file(path)? {
            deep_merge(&mut merged, &overlay);
            loaded_files.push(path.display().to_string());
            info!(path = %path.display(), layer, "loaded config");
        }
    }

    if let Some(path) = &sources.explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        })?;
        deep_merge(&mut merged, &overlay);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), layer = "explicit", "loaded config");
    }

    let mut config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    if let Some(level) = log_override.map(str::trim).filter(|l| !l.is_empty()) {
        debug!(level, "log level overridden from {LOG_ENV_VAR}");
        config.logging.level = level.to_owned();
    }

    validate::validate(&config)?;
    Ok(ResolvedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a single file over the defaults (no other layers).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let sources = ConfigSources {
        explicit: Some(path.to_path_buf()),
        ..ConfigSources::default()
    };
    load_from(&sources, None).map(|r| r.config)
}

/// Recursively merge `overlay` into `base`.
///
/// Tables merge per key; scalars and arrays from the overlay replace the
/// base value.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Try to load a file, returning `None` if it doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if u64::try_from(content.len()).unwrap_or(u64::MAX) > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}
