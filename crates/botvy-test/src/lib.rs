//! Botvy Test - Shared test utilities for the Botvy plugin framework.
//!
//! This crate provides plugin directory fixtures and recording plugin modules
//! that can be used across Botvy crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! botvy-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use botvy_test::{InitLog, PluginDirBuilder, PluginFixture, recording_table};
//!
//! #[tokio::test]
//! async fn loads_a_plugin() {
//!     let plugins = PluginDirBuilder::new();
//!     plugins.add(&PluginFixture::new("com.test.a"));
//!
//!     let log = InitLog::new();
//!     let table = recording_table(&log, ["com.test.a"]);
//!     // ... build a PluginManager over plugins.path() and table
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
