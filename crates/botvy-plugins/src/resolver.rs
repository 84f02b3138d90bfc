//! Dependency ordering.
//!
//! The resolver places every dependency strictly before its dependents. It
//! walks depth-first in insertion order, so two plugins with no ordering
//! constraint between them keep the order they were discovered in. A cycle or
//! a reference to an unknown id invalidates the whole set.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::error::{PluginError, PluginResult};
use crate::manifest::PluginDescriptor;
use crate::plugin::PluginId;

/// Collects discovered manifests and orders them by dependency.
#[derive(Debug, Clone)]
pub struct DependencyResolver<M> {
    found: Vec<M>,
    index: HashMap<PluginId, usize>,
}

impl<M> Default for DependencyResolver<M> {
    fn default() -> Self {
        Self {
            found: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<M: PluginDescriptor> DependencyResolver<M> {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver over `found`, keeping only the `active` ids when given.
    ///
    /// Active ids that are not in `found` are logged and otherwise ignored.
    #[must_use]
    pub fn from_active(found: impl IntoIterator<Item = M>, active: Option<&[PluginId]>) -> Self {
        let mut resolver = Self::new();
        for manifest in found {
            if active.is_none_or(|ids| ids.contains(manifest.id())) {
                resolver.add_found_plugin(manifest);
            }
        }
        if let Some(active) = active {
            for id in active.iter().filter(|id| !resolver.index.contains_key(*id)) {
                warn!(plugin_id = %id, "Active plugin was not found");
            }
            debug!(count = resolver.len(), "Filtered by activation list");
        }
        resolver
    }

    /// Add a discovered manifest.
    ///
    /// Adding an id that is already present is a no-op. Returns whether the
    /// manifest was added.
    pub fn add_found_plugin(&mut self, manifest: M) -> bool {
        let id = manifest.id().clone();
        if self.index.contains_key(&id) {
            debug!(plugin_id = %id, "Plugin already found, ignoring duplicate");
            return false;
        }
        self.index.insert(id, self.found.len());
        self.found.push(manifest);
        true
    }

    /// Manifests in the order they were added.
    #[must_use]
    pub fn found_plugins(&self) -> &[M] {
        &self.found
    }

    /// Number of distinct manifests found.
    #[must_use]
    pub fn len(&self) -> usize {
        self.found.len()
    }

    /// Whether nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    /// Order the found manifests so dependencies come first.
    ///
    /// Each call starts from scratch, so the resolver can be re-run after more
    /// manifests were added.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::CircularDependency`] if the manifests form a
    /// cycle, or [`PluginError::DependencyNotFound`] if one depends on an id
    /// that was never added. No partial order is returned in either case.
    pub fn resolve_plugins(&self) -> PluginResult<Vec<M>>
    where
        M: Clone,
    {
        let mut walk = Walk {
            resolver: self,
            placed: vec![false; self.found.len()],
            resolving: Vec::new(),
            ordered: Vec::with_capacity(self.found.len()),
        };

        for (idx, manifest) in self.found.iter().enumerate() {
            if walk.placed[idx] {
                continue;
            }
            if manifest.depends_on().is_empty() {
                walk.place(idx);
                continue;
            }
            walk.visit(idx)?;
        }

        Ok(walk
            .ordered
            .into_iter()
            .map(|idx| self.found[idx].clone())
            .collect())
    }
}

struct Walk<'a, M> {
    resolver: &'a DependencyResolver<M>,
    placed: Vec<bool>,
    resolving: Vec<usize>,
    ordered: Vec<usize>,
}

impl<M: PluginDescriptor> Walk<'_, M> {
    fn place(&mut self, idx: usize) {
        trace!(plugin_id = %self.resolver.found[idx].id(), "Placed plugin");
        self.placed[idx] = true;
        self.ordered.push(idx);
    }

    fn visit(&mut self, idx: usize) -> PluginResult<()> {
        let resolver = self.resolver;
        let found = &resolver.found;

        if let Some(start) = self.resolving.iter().position(|&i| i == idx) {
            let chain = self.resolving[start..]
                .iter()
                .chain(std::iter::once(&idx))
                .map(|&i| found[i].id().clone())
                .collect();
            return Err(PluginError::CircularDependency { chain });
        }

        self.resolving.push(idx);

        let manifest = &found[idx];
        for dependency in manifest.depends_on() {
            let Some(&dep_idx) = resolver.index.get(dependency) else {
                return Err(PluginError::DependencyNotFound {
                    plugin: manifest.id().clone(),
                    dependency: dependency.clone(),
                });
            };
            if self.placed[dep_idx] {
                continue;
            }
            self.visit(dep_idx)?;
        }

        self.place(idx);
        self.resolving.pop();
        Ok(())
    }
}
