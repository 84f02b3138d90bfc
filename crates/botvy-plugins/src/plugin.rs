//! Plugin identity, the plugin code trait, and live plugin instances.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::PluginContext;
use crate::error::{PluginError, PluginResult};
use crate::manifest::{PluginAuthor, ResolvedManifest};

/// A plugin's reverse-domain name, such as `com.github.botvy.explorer`.
///
/// Two or more non-empty segments joined by `.`, each made of ASCII
/// alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PluginId(String);

// Manifests and config go through `new`.
impl<'de> Deserialize<'de> for PluginId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl PluginId {
    /// Parse `id`.
    ///
    /// # Errors
    ///
    /// [`PluginError::InvalidId`] naming the first rule `id` breaks.
    pub fn new(id: impl Into<String>) -> PluginResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Wrap a literal known to be well formed. Nothing is checked.
    #[must_use]
    pub fn from_static(id: &str) -> Self {
        Self(id.to_string())
    }

    /// An id named in another plugin's `dependsOn`.
    ///
    /// Only emptiness is checked here. A name no discovered plugin carries is
    /// reported by the resolver as [`PluginError::DependencyNotFound`].
    ///
    /// # Errors
    ///
    /// [`PluginError::InvalidId`] for an empty reference.
    pub fn reference(id: impl Into<String>) -> PluginResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(PluginError::InvalidId("dependency reference is empty".into()));
        }
        Ok(Self(id))
    }

    /// The id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether [`PluginId::new`] would accept `id`.
    #[must_use]
    pub fn is_valid_id(id: &str) -> bool {
        Self::validate(id).is_ok()
    }

    fn validate(id: &str) -> PluginResult<()> {
        let reject = |rule: &str| -> PluginResult<()> {
            Err(PluginError::InvalidId(format!("`{id}` {rule}")))
        };
        if id.is_empty() {
            return reject("is empty");
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return reject(&format!("contains {c:?}"));
        }
        if !id.contains('.') {
            return reject("has no vendor prefix, e.g. `com.vendor.name`");
        }
        if id.split('.').any(str::is_empty) {
            return reject("has an empty segment");
        }
        Ok(())
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PluginId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The lifecycle state of a plugin instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PluginState {
    /// Constructed, `initialize` not yet called.
    Instantiated,
    /// `initialize` is running.
    Initializing,
    /// `initialize` completed.
    Ready,
    /// `initialize` failed or timed out.
    Failed(String),
}

/// The code side of a plugin.
///
/// Implementors are produced by a [`PluginFactory`](crate::PluginFactory)
/// registered in the host's [`ModuleTable`](crate::ModuleTable). The factory
/// receives the [`ServiceRegistry`](crate::ServiceRegistry), so anything bound
/// by the plugin's additional container bindings is available at construction.
#[async_trait]
pub trait PluginModule: Send + Sync {
    /// Bring the plugin up. Called at most once, in dependency order.
    async fn initialize(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()>;
}

impl fmt::Debug for dyn PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule").finish_non_exhaustive()
    }
}

/// A live plugin: manifest metadata plus the module built from its entrypoint.
#[derive(Debug)]
pub struct PluginInstance {
    manifest: ResolvedManifest,
    module: Box<dyn PluginModule>,
    state: PluginState,
}

impl PluginInstance {
    /// Stamp a freshly built module with its manifest metadata.
    #[must_use]
    pub fn new(manifest: ResolvedManifest, module: Box<dyn PluginModule>) -> Self {
        Self {
            manifest,
            module,
            state: PluginState::Instantiated,
        }
    }

    /// The unique identifier for this plugin.
    #[must_use]
    pub fn id(&self) -> &PluginId {
        &self.manifest.id
    }

    /// Human-readable display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Version string from the manifest.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Plugin authors.
    #[must_use]
    pub fn authors(&self) -> &[PluginAuthor] {
        &self.manifest.authors
    }

    /// Ids of the plugins this one depends on.
    #[must_use]
    pub fn depends_on(&self) -> &[PluginId] {
        &self.manifest.depends_on
    }

    /// Absolute path of the entrypoint stub.
    #[must_use]
    pub fn entrypoint(&self) -> &Path {
        &self.manifest.entrypoint
    }

    /// Absolute paths of the binding stubs, in load order.
    #[must_use]
    pub fn additional_container_bindings(&self) -> &[PathBuf] {
        &self.manifest.additional_container_bindings
    }

    /// Absolute paths of the UI contributions, per section.
    #[must_use]
    pub fn section_components(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        &self.manifest.section_components
    }

    /// The full resolved manifest.
    #[must_use]
    pub fn manifest(&self) -> &ResolvedManifest {
        &self.manifest
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> &PluginState {
        &self.state
    }

    /// Run the module's `initialize`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyInitialized`] if `initialize` already ran,
    /// or whatever the module itself reports.
    pub async fn initialize(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()> {
        if self.state != PluginState::Instantiated {
            return Err(PluginError::AlreadyInitialized(self.manifest.id.clone()));
        }

        self.state = PluginState::Initializing;
        match self.module.initialize(ctx).await {
            Ok(()) => {
                self.state = PluginState::Ready;
                Ok(())
            },
            Err(e) => {
                self.state = PluginState::Failed(e.to_string());
                Err(e)
            },
        }
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        self.state = PluginState::Failed(reason.into());
    }
}
