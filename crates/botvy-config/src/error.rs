use std::io;
use thiserror::Error;

/// Everything that can go wrong while loading host configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Unreadable {
        /// The file.
        path: String,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },

    /// A layer is not valid TOML or does not fit the config schema.
    #[error("{path} is not a valid botvy config: {source}")]
    Malformed {
        /// The file, or `<merged config>` when the merged layers are at fault.
        path: String,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid `{field}`: {message}")]
    Invalid {
        /// Dotted key, e.g. `logging.level`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// `$HOME` could not be resolved, so the user layer has no location.
    #[error("no home directory for the user config layer")]
    HomeUnknown,
}

/// Shorthand used across this crate.
pub type ConfigResult<T> = Result<T, ConfigError>;
