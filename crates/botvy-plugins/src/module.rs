//! Turning a module path into code.
//!
//! Plugin code is compiled into the host and registered by name in a
//! [`ModuleTable`]. On disk a plugin only ships *module stubs*: tiny TOML files
//! whose `default` key names the export they stand for.
//!
//! ```toml
//! # main.toml
//! default = "explorer"
//! ```
//!
//! A [`ModuleSource`] maps a stub path to its [`ModuleExport`]. Keeping the
//! lookup behind a trait lets a host swap in another strategy (dynamic
//! libraries, an embedded scripting runtime) without touching the instantiator.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::{PluginError, PluginResult};
use crate::plugin::PluginModule;
use crate::registry::{PluginFactory, ServiceRegistry};

/// Key in a module stub naming the export.
pub const DEFAULT_EXPORT_KEY: &str = "default";

/// A bundle of registry bindings a plugin applies before its entrypoint loads.
pub trait ContainerModule: Send + Sync {
    /// Bind services into the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a binding fails, e.g. because its key is taken.
    fn load(&self, registry: &mut ServiceRegistry) -> PluginResult<()>;
}

/// What a module stub resolves to.
#[derive(Clone)]
pub enum ModuleExport {
    /// Plugin code, used as an entrypoint.
    Plugin(PluginFactory),
    /// Registry bindings, used as an additional container binding.
    Bindings(Arc<dyn ContainerModule>),
}

impl ModuleExport {
    /// Short name of the export kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plugin(_) => "plugin",
            Self::Bindings(_) => "binding module",
        }
    }
}

impl fmt::Debug for ModuleExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleExport").field(&self.kind()).finish()
    }
}

/// The host's build-time table of loadable exports.
#[derive(Clone, Default)]
pub struct ModuleTable {
    exports: HashMap<String, ModuleExport>,
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleTable")
            .field("exports", &self.names())
            .finish()
    }
}

impl ModuleTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register plugin code under `name`, replacing any previous export.
    #[must_use]
    pub fn with_plugin<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ServiceRegistry) -> PluginResult<Box<dyn PluginModule>> + Send + Sync + 'static,
    {
        self.insert(name, ModuleExport::Plugin(Arc::new(factory)));
        self
    }

    /// Register a binding module under `name`, replacing any previous export.
    #[must_use]
    pub fn with_bindings<C>(mut self, name: impl Into<String>, module: C) -> Self
    where
        C: ContainerModule + 'static,
    {
        self.insert(name, ModuleExport::Bindings(Arc::new(module)));
        self
    }

    /// Register an export. Returns the one it replaced, if any.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        export: ModuleExport,
    ) -> Option<ModuleExport> {
        self.exports.insert(name.into(), export)
    }

    /// Look up an export.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModuleExport> {
        self.exports.get(name)
    }

    /// Registered export names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exports.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered exports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

/// Resolves a module path to an export.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Load the module at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the module cannot be read or has no usable default
    /// export.
    async fn load_module(&self, path: &Path) -> PluginResult<ModuleExport>;
}

/// Reads TOML module stubs and looks their `default` export up in a table.
#[derive(Debug, Clone)]
pub struct StubModuleSource {
    table: ModuleTable,
}

impl StubModuleSource {
    /// Create a source backed by `table`.
    #[must_use]
    pub fn new(table: ModuleTable) -> Self {
        Self { table }
    }

    /// The backing table.
    #[must_use]
    pub fn table(&self) -> &ModuleTable {
        &self.table
    }

    /// Parse stub contents into the export name.
    fn export_name(path: &Path, contents: &str) -> PluginResult<String> {
        let stub: toml::Table =
            toml::from_str(contents).map_err(|e| PluginError::InvalidModuleStub {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        match stub.get(DEFAULT_EXPORT_KEY) {
            None => Err(PluginError::NoDefaultExport {
                path: path.to_path_buf(),
            }),
            Some(toml::Value::String(name)) if !name.is_empty() => Ok(name.clone()),
            Some(_) => Err(PluginError::InvalidModuleStub {
                path: path.to_path_buf(),
                message: format!("`{DEFAULT_EXPORT_KEY}` must be a non-empty string"),
            }),
        }
    }
}

#[async_trait]
impl ModuleSource for StubModuleSource {
    async fn load_module(&self, path: &Path) -> PluginResult<ModuleExport> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            PluginError::InvalidModuleStub {
                path: path.to_path_buf(),
                message: format!("could not read module stub: {e}"),
            }
        })?;

        let name = Self::export_name(path, &contents)?;
        trace!(path = %path.display(), export = %name, "Resolved module stub");

        self.table
            .get(&name)
            .cloned()
            .ok_or_else(|| PluginError::UnknownExport {
                path: path.to_path_buf(),
                export: name,
            })
    }
}
