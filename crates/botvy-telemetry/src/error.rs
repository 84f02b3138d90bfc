//! Logging setup failures.

use thiserror::Error;

/// Why [`setup_logging`](crate::setup_logging) gave up.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Unknown format name or an unparsable filter directive.
    #[error("bad logging setting: {0}")]
    BadSetting(String),

    /// A global subscriber was already installed in this process.
    #[error("cannot install log subscriber: {0}")]
    SubscriberInstalled(String),

    /// The log directory could not be created.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shorthand for logging setup results.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
