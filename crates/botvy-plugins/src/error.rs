//! Plugin error types.

use std::path::PathBuf;
use std::time::Duration;

use crate::plugin::PluginId;

/// Errors from plugin operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The requested plugin was not found.
    #[error("plugin not found: {0}")]
    NotFound(PluginId),

    /// The plugin ID is invalid.
    #[error("invalid plugin id: {0}")]
    InvalidId(String),

    /// The plugins root directory did not exist and could not be created.
    #[error("could not create plugin directory {path}: {source}")]
    DirectoryCreate {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Two plugins depend on each other, directly or through others.
    ///
    /// `chain` starts and ends with the same id.
    #[error("circular dependency found: {}", join_ids(.chain))]
    CircularDependency {
        /// The ids forming the cycle.
        chain: Vec<PluginId>,
    },

    /// A plugin depends on an id that is not part of the discovered set.
    #[error("the plugin with the id \"{dependency}\" was not found (required by {plugin})")]
    DependencyNotFound {
        /// The plugin declaring the dependency.
        plugin: PluginId,
        /// The missing dependency.
        dependency: PluginId,
    },

    /// A plugin was skipped because one of its dependencies failed to instantiate.
    #[error("plugin {plugin} skipped: dependency {dependency} failed to instantiate")]
    DependencyFailed {
        /// The skipped plugin.
        plugin: PluginId,
        /// The dependency that failed.
        dependency: PluginId,
    },

    /// A module stub declares no `default` export.
    #[error("file \"{}\" has no default export", .path.display())]
    NoDefaultExport {
        /// Path of the module stub.
        path: PathBuf,
    },

    /// A module stub names an export the host never registered.
    #[error("file \"{}\" exports \"{export}\", which is not registered", .path.display())]
    UnknownExport {
        /// Path of the module stub.
        path: PathBuf,
        /// The export name from the stub.
        export: String,
    },

    /// An export was used in the wrong role (bindings as entrypoint or the reverse).
    #[error("file \"{}\" exports a {found} where a {expected} was expected", .path.display())]
    ExportKindMismatch {
        /// Path of the module stub.
        path: PathBuf,
        /// The kind that was required.
        expected: &'static str,
        /// The kind that was found.
        found: &'static str,
    },

    /// A module stub could not be parsed.
    #[error("invalid module stub {}: {message}", .path.display())]
    InvalidModuleStub {
        /// Path of the module stub.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// A registry key is already bound. Existing bindings are never replaced.
    #[error("registry key already bound: {0}")]
    AlreadyBound(String),

    /// A service was requested that nobody bound.
    #[error("service not bound: {0}")]
    ServiceNotFound(String),

    /// A service is bound, but with a different type than requested.
    #[error("service {key} is not a {expected}")]
    ServiceTypeMismatch {
        /// The registry key.
        key: String,
        /// The requested type name.
        expected: &'static str,
    },

    /// A plugin's `initialize` did not settle in time.
    #[error("plugin {plugin_id} did not initialize within {timeout:?}")]
    InitTimeout {
        /// The plugin that timed out.
        plugin_id: PluginId,
        /// The configured limit.
        timeout: Duration,
    },

    /// `load_plugins` was called on a manager that already loaded its plugins.
    #[error("plugins were already loaded")]
    AlreadyLoaded,

    /// `initialize` was called on an instance that already ran it.
    #[error("plugin {0} was already initialized")]
    AlreadyInitialized(PluginId),

    /// Plugin code reported a failure.
    #[error("plugin execution failed: {0}")]
    ExecutionFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_ids(ids: &[PluginId]) -> String {
    ids.iter()
        .map(PluginId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_dependency_message_lists_chain() {
        let err = PluginError::CircularDependency {
            chain: vec![
                PluginId::from_static("com.a.root"),
                PluginId::from_static("com.a.child"),
                PluginId::from_static("com.a.root"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency found: com.a.root -> com.a.child -> com.a.root"
        );
    }

    #[test]
    fn dependency_not_found_names_missing_id() {
        let err = PluginError::DependencyNotFound {
            plugin: PluginId::from_static("com.a.root"),
            dependency: PluginId::from_static("missing.id"),
        };
        assert!(err.to_string().contains("\"missing.id\""));
    }
}
