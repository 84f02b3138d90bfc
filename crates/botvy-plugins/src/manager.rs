//! The host-facing plugin manager.
//!
//! The manager owns every stage of the pipeline:
//! loaders → resolver → instantiator → `initialize`.
//!
//! ```no_run
//! # async fn run() -> botvy_plugins::PluginResult<()> {
//! use botvy_plugins::{
//!     DirectoryPluginLoader, ModulePluginInstantiator, ModuleTable, PluginManager,
//!     StubModuleSource,
//! };
//!
//! let instantiator = ModulePluginInstantiator::new(StubModuleSource::new(ModuleTable::new()));
//! let mut manager = PluginManager::builder(instantiator)
//!     .loader(DirectoryPluginLoader::new("plugins"))
//!     .build()?;
//!
//! manager.load_plugins(None).await?;
//! let report = manager.initialize_plugins().await;
//! println!("{} plugin(s) ready", report.ready.len());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::context::{InitializationSide, PluginContext};
use crate::error::{PluginError, PluginResult};
use crate::instantiator::PluginInstantiator;
use crate::loader::PluginLoader;
use crate::manifest::{ResolvedManifest, format_authors};
use crate::plugin::{PluginId, PluginInstance, PluginState};
use crate::registry::{ServiceRegistry, services};
use crate::resolver::DependencyResolver;

/// Outcome of [`PluginManager::initialize_plugins`].
#[derive(Debug, Default)]
pub struct InitializationReport {
    /// Plugins whose `initialize` completed, in order.
    pub ready: Vec<PluginId>,
    /// Plugins whose `initialize` failed or timed out, in order.
    pub failed: Vec<(PluginId, PluginError)>,
}

impl InitializationReport {
    /// Whether every attempted plugin came up.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A serializable one-line description of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    /// Plugin id.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// Version.
    pub version: String,
    /// Authors joined into one line.
    pub authors: String,
    /// Lifecycle state.
    pub state: PluginState,
    /// UI contributions per section.
    pub section_components: BTreeMap<String, Vec<PathBuf>>,
}

impl From<&PluginInstance> for PluginSummary {
    fn from(instance: &PluginInstance) -> Self {
        Self {
            id: instance.id().clone(),
            name: instance.name().to_string(),
            version: instance.version().to_string(),
            authors: format_authors(instance.authors()),
            state: instance.state().clone(),
            section_components: instance.section_components().clone(),
        }
    }
}

/// Builder for [`PluginManager`].
pub struct PluginManagerBuilder {
    loaders: Vec<Box<dyn PluginLoader>>,
    instantiator: Box<dyn PluginInstantiator>,
    registry: ServiceRegistry,
    side: InitializationSide,
    init_timeout: Option<Duration>,
}

impl PluginManagerBuilder {
    /// Add a loader. Loaders are queried in the order they were added.
    #[must_use]
    pub fn loader(mut self, loader: impl PluginLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    /// Start from a registry the host already filled.
    #[must_use]
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Which side of the application is initializing plugins.
    #[must_use]
    pub fn side(mut self, side: InitializationSide) -> Self {
        self.side = side;
        self
    }

    /// Bound each plugin's `initialize` call.
    #[must_use]
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = Some(timeout);
        self
    }

    /// Build the manager.
    ///
    /// Binds the initialization side into the registry unless the host
    /// already did.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry rejects the binding.
    pub fn build(self) -> PluginResult<PluginManager> {
        let mut registry = self.registry;
        if !registry.contains(services::INITIALIZATION_SIDE) {
            registry.bind(services::INITIALIZATION_SIDE, self.side)?;
        }

        Ok(PluginManager {
            loaders: self.loaders,
            instantiator: self.instantiator,
            registry,
            side: self.side,
            init_timeout: self.init_timeout,
            loaded: false,
            ordered: Vec::new(),
            instances: Vec::new(),
            failed: Vec::new(),
        })
    }
}

/// Orchestrates plugin discovery, resolution, instantiation and startup.
pub struct PluginManager {
    loaders: Vec<Box<dyn PluginLoader>>,
    instantiator: Box<dyn PluginInstantiator>,
    registry: ServiceRegistry,
    side: InitializationSide,
    init_timeout: Option<Duration>,
    loaded: bool,
    ordered: Vec<ResolvedManifest>,
    instances: Vec<PluginInstance>,
    failed: Vec<(PluginId, PluginError)>,
}

impl PluginManager {
    /// Start building a manager around `instantiator`.
    #[must_use]
    pub fn builder(instantiator: impl PluginInstantiator + 'static) -> PluginManagerBuilder {
        PluginManagerBuilder {
            loaders: Vec::new(),
            instantiator: Box::new(instantiator),
            registry: ServiceRegistry::new(),
            side: InitializationSide::default(),
            init_timeout: None,
        }
    }

    /// Discover, resolve and instantiate plugins.
    ///
    /// When `active` is given only those ids are kept. Everything that was
    /// discovered is kept otherwise. Active ids nobody discovered are logged.
    ///
    /// # Errors
    ///
    /// Returns loader errors, [`PluginError::CircularDependency`] and
    /// [`PluginError::DependencyNotFound`], or [`PluginError::AlreadyLoaded`]
    /// on a second call. Plugins that fail to instantiate do not fail the
    /// call; see [`failed_plugins`](Self::failed_plugins).
    pub async fn load_plugins(&mut self, active: Option<&[PluginId]>) -> PluginResult<()> {
        if self.loaded {
            return Err(PluginError::AlreadyLoaded);
        }

        let mut seen: HashSet<PluginId> = HashSet::new();
        let mut found = Vec::new();
        for loader in &self.loaders {
            debug!(loader = loader.name(), "Querying plugin loader");
            for manifest in loader.load_plugins().await? {
                if !seen.insert(manifest.id.clone()) {
                    warn!(
                        plugin_id = %manifest.id,
                        loader = loader.name(),
                        path = %manifest.plugin_dir.display(),
                        "Plugin id already found by an earlier loader, ignoring"
                    );
                    continue;
                }
                found.push(manifest);
            }
        }
        debug!(count = found.len(), "Discovered plugins");

        let ordered = DependencyResolver::from_active(found, active).resolve_plugins()?;
        info!(
            order = %ordered.iter().map(|m| m.id.as_str()).collect::<Vec<_>>().join(", "),
            "Resolved plugin load order"
        );

        let instantiation = self
            .instantiator
            .instantiate_plugins(&ordered, &mut self.registry)
            .await?;

        self.loaded = true;
        self.ordered = ordered;
        self.instances = instantiation.instances;
        self.failed = instantiation.failed;
        Ok(())
    }

    /// Initialize loaded plugins in resolved order.
    ///
    /// A failing or timed-out plugin is logged and the rest continue. Plugins
    /// that were already initialized are skipped.
    pub async fn initialize_plugins(&mut self) -> InitializationReport {
        let mut report = InitializationReport::default();

        for instance in &mut self.instances {
            if instance.state() != &PluginState::Instantiated {
                trace!(plugin_id = %instance.id(), "Plugin already initialized, skipping");
                continue;
            }

            let id = instance.id().clone();
            let ctx = PluginContext::new(&id, self.side, &self.registry);
            debug!(plugin_id = %id, side = %self.side, "Initializing plugin");

            let outcome = match self.init_timeout {
                Some(limit) => {
                    let settled = tokio::time::timeout(limit, instance.initialize(&ctx)).await;
                    match settled {
                        Ok(result) => result,
                        Err(_) => {
                            instance.mark_failed(format!("timed out after {limit:?}"));
                            Err(PluginError::InitTimeout {
                                plugin_id: id.clone(),
                                timeout: limit,
                            })
                        },
                    }
                },
                None => instance.initialize(&ctx).await,
            };

            match outcome {
                Ok(()) => {
                    info!(plugin_id = %id, "Initialized plugin");
                    report.ready.push(id);
                },
                Err(e) => {
                    error!(plugin_id = %id, error = %e, "Failed to initialize plugin");
                    report.failed.push((id, e));
                },
            }
        }

        report
    }

    /// Manifests in resolved order, including plugins that failed to instantiate.
    #[must_use]
    pub fn ordered_plugins(&self) -> &[ResolvedManifest] {
        &self.ordered
    }

    /// Live plugin instances in resolved order.
    #[must_use]
    pub fn loaded_plugins(&self) -> &[PluginInstance] {
        &self.instances
    }

    /// Plugins that could not be instantiated.
    #[must_use]
    pub fn failed_plugins(&self) -> &[(PluginId, PluginError)] {
        &self.failed
    }

    /// Look up a live instance.
    #[must_use]
    pub fn plugin(&self, id: &PluginId) -> Option<&PluginInstance> {
        self.instances.iter().find(|i| i.id() == id)
    }

    /// Summaries of the live instances, for sending to a UI.
    #[must_use]
    pub fn plugin_listing(&self) -> Vec<PluginSummary> {
        self.instances.iter().map(PluginSummary::from).collect()
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Which side of the application this manager runs on.
    #[must_use]
    pub fn side(&self) -> InitializationSide {
        self.side
    }
}
