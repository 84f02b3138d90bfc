//! Botvy Telemetry - Logging setup for the Botvy plugin host.
//!
//! Builds a `tracing` subscriber from a [`LogConfig`]: an `EnvFilter` made of
//! a base level plus per-crate directives, and one `fmt` layer writing to
//! stdout, stderr or a log directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use botvy_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), botvy_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("botvy_plugins=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
