use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// The file.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML or does not fit the schema.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// The file, or `<embedded defaults>` / `<merged config>`.
        path: String,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid config value for {field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
