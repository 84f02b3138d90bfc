//! Building plugin instances from resolved manifests.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, error, trace, warn};

use crate::error::{PluginError, PluginResult};
use crate::manifest::ResolvedManifest;
use crate::module::{ModuleExport, ModuleSource};
use crate::plugin::{PluginId, PluginInstance};
use crate::registry::ServiceRegistry;

/// Outcome of instantiating a batch of manifests.
#[derive(Debug, Default)]
pub struct Instantiation {
    /// Live instances, in the order of the input manifests.
    pub instances: Vec<PluginInstance>,
    /// Plugins that could not be instantiated, with the reason.
    pub failed: Vec<(PluginId, PluginError)>,
}

/// Turns resolved manifests into plugin instances.
#[async_trait]
pub trait PluginInstantiator: Send + Sync {
    /// Instantiate `manifests`, which must already be in dependency order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the batch as a whole cannot proceed. Failures
    /// of single plugins are reported in [`Instantiation::failed`].
    async fn instantiate_plugins(
        &self,
        manifests: &[ResolvedManifest],
        registry: &mut ServiceRegistry,
    ) -> PluginResult<Instantiation>;
}

/// Instantiates plugins from module exports.
///
/// Per plugin: apply each additional container binding in order, load the
/// entrypoint export, register its factory under the plugin id, then ask the
/// registry for the instance. A plugin that fails is skipped together with
/// every later plugin depending on it. Bindings applied before the failure
/// stay in the registry.
#[derive(Debug, Clone)]
pub struct ModulePluginInstantiator<S> {
    source: S,
}

impl<S: ModuleSource> ModulePluginInstantiator<S> {
    /// Create an instantiator loading modules from `source`.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// The module source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    async fn bind_additional_container_bindings(
        &self,
        manifest: &ResolvedManifest,
        registry: &mut ServiceRegistry,
    ) -> PluginResult<()> {
        for path in &manifest.additional_container_bindings {
            trace!(plugin_id = %manifest.id, path = %path.display(), "Loading container bindings");
            match self.source.load_module(path).await? {
                ModuleExport::Bindings(module) => module.load(registry)?,
                other => {
                    return Err(PluginError::ExportKindMismatch {
                        path: path.clone(),
                        expected: "binding module",
                        found: other.kind(),
                    });
                },
            }
            debug!(plugin_id = %manifest.id, path = %path.display(), "Applied container bindings");
        }
        Ok(())
    }

    async fn instantiate_plugin(
        &self,
        manifest: &ResolvedManifest,
        registry: &mut ServiceRegistry,
    ) -> PluginResult<PluginInstance> {
        self.bind_additional_container_bindings(manifest, registry)
            .await?;

        let factory = match self.source.load_module(&manifest.entrypoint).await? {
            ModuleExport::Plugin(factory) => factory,
            other => {
                return Err(PluginError::ExportKindMismatch {
                    path: manifest.entrypoint.clone(),
                    expected: "plugin",
                    found: other.kind(),
                });
            },
        };

        trace!(plugin_id = %manifest.id, "Registering plugin factory");
        registry.register_plugin(manifest.id.clone(), factory)?;

        debug!(plugin_id = %manifest.id, "Trying to instantiate the plugin");
        let module = registry.instantiate(&manifest.id)?;
        Ok(PluginInstance::new(manifest.clone(), module))
    }
}

#[async_trait]
impl<S: ModuleSource> PluginInstantiator for ModulePluginInstantiator<S> {
    async fn instantiate_plugins(
        &self,
        manifests: &[ResolvedManifest],
        registry: &mut ServiceRegistry,
    ) -> PluginResult<Instantiation> {
        let mut result = Instantiation::default();
        let mut failed_ids: HashSet<PluginId> = HashSet::new();

        for manifest in manifests {
            if let Some(dependency) = manifest
                .depends_on
                .iter()
                .find(|dep| failed_ids.contains(*dep))
            {
                warn!(
                    plugin_id = %manifest.id,
                    dependency = %dependency,
                    "Skipping plugin, a dependency failed to instantiate"
                );
                let err = PluginError::DependencyFailed {
                    plugin: manifest.id.clone(),
                    dependency: dependency.clone(),
                };
                failed_ids.insert(manifest.id.clone());
                result.failed.push((manifest.id.clone(), err));
                continue;
            }

            match self.instantiate_plugin(manifest, registry).await {
                Ok(instance) => {
                    debug!(plugin_id = %manifest.id, "Plugin instantiated");
                    result.instances.push(instance);
                },
                Err(e) => {
                    error!(plugin_id = %manifest.id, error = %e, "Failed to instantiate plugin");
                    failed_ids.insert(manifest.id.clone());
                    result.failed.push((manifest.id.clone(), e));
                },
            }
        }

        Ok(result)
    }
}
