//! Test harness helpers: temp roots, a ready-made manager, and logging.

use std::path::Path;

use botvy_plugins::{
    DirectoryPluginLoader, InitializationSide, ModulePluginInstantiator, ModuleTable,
    PluginManager, PluginManagerBuilder, StubModuleSource,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Create a temporary directory, removed when the returned `TempDir` drops.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created.
#[must_use]
pub fn temp_root() -> TempDir {
    TempDir::with_prefix("botvy-plugins-").expect("Failed to create temp directory")
}

/// A manager builder with one directory loader per root, in order, and
/// `table` behind the stub module source.
#[must_use]
pub fn manager_builder(roots: &[&Path], table: ModuleTable) -> PluginManagerBuilder {
    let instantiator = ModulePluginInstantiator::new(StubModuleSource::new(table));
    roots
        .iter()
        .enumerate()
        .fold(PluginManager::builder(instantiator), |builder, (i, root)| {
            let loader = DirectoryPluginLoader::new(*root).with_name(format!("test loader {i}"));
            builder.loader(loader)
        })
}

/// [`manager_builder`] built for `side`.
///
/// # Panics
///
/// Panics if the manager cannot be built.
#[must_use]
pub fn manager_over(
    roots: &[&Path],
    table: ModuleTable,
    side: InitializationSide,
) -> PluginManager {
    manager_builder(roots, table)
        .side(side)
        .build()
        .expect("Failed to build plugin manager")
}

/// Set up test logging with the given filter.
///
/// Safe to call from every test; only the first call installs a subscriber.
///
/// ```rust,ignore
/// botvy_test::setup_test_logging("botvy_plugins=debug");
/// ```
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging at `warn`.
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}
