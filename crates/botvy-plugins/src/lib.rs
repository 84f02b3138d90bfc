//! Plugin pipeline for the Botvy desktop client and server.
//!
//! Plugins live in per-plugin directories, each carrying a `plugin.json`
//! descriptor. This crate takes them from disk to running instances:
//!
//! - [`PluginManifest`] / [`ResolvedManifest`]: the descriptor before and after
//!   its paths were rooted in the plugin directory
//! - [`schema`]: declarative validation of the raw descriptor, including the
//!   path-containment rules
//! - [`PluginLoader`] / [`DirectoryPluginLoader`]: discovery strategies
//! - [`DependencyResolver`]: deterministic dependency ordering with cycle and
//!   missing-dependency detection
//! - [`ModuleTable`] / [`ModuleSource`]: how an entrypoint path becomes code
//! - [`ServiceRegistry`]: the explicit registry plugins are wired through
//! - [`PluginInstantiator`] / [`ModulePluginInstantiator`]: builds
//!   [`PluginInstance`]s in resolved order
//! - [`PluginManager`]: the host-facing orchestrator
//!
//! # Loading Code
//!
//! Plugin code is linked into the host at build time. An entrypoint file is a
//! small TOML *module stub* whose `default` key names an export registered in
//! the host's [`ModuleTable`]. The stub still has to live inside the plugin
//! directory, so the path-containment rules apply to it like to any other file.
//!
//! # Failure Isolation
//!
//! A broken candidate directory is skipped by the loader. A plugin that fails
//! to instantiate is skipped together with everything depending on it. A
//! plugin whose `initialize` fails is logged and the rest keep going. Only a
//! structurally broken set (cycles, unknown dependencies) fails a load.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod context;
pub mod error;
pub mod instantiator;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod module;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod security;

pub use context::{InitializationSide, PluginContext};
pub use error::{PluginError, PluginResult};
pub use instantiator::{Instantiation, ModulePluginInstantiator, PluginInstantiator};
pub use loader::{CandidateError, DirectoryPluginLoader, MANIFEST_FILE_NAME, PluginLoader};
pub use manager::{InitializationReport, PluginManager, PluginManagerBuilder, PluginSummary};
pub use manifest::{
    PluginAuthor, PluginDescriptor, PluginManifest, ResolvedManifest, format_authors,
};
pub use module::{ContainerModule, ModuleExport, ModuleSource, ModuleTable, StubModuleSource};
pub use plugin::{PluginId, PluginInstance, PluginModule, PluginState};
pub use registry::{PluginFactory, ServiceRegistry, services};
pub use resolver::DependencyResolver;
pub use schema::{Diagnostic, DiagnosticSink, Schema, TracingSink};
