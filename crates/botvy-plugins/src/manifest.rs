//! Plugin descriptor model.
//!
//! A plugin directory carries a `plugin.json`:
//!
//! ```json
//! {
//!   "id": "com.github.botvy.explorer",
//!   "name": "Explorer",
//!   "version": "1.2.0",
//!   "authors": [{ "name": "Jane Doe", "email": "jane@example.com" }],
//!   "dependsOn": ["com.github.botvy.core"],
//!   "entrypoint": "main.toml",
//!   "additionalContainerBindings": ["bindings.toml"],
//!   "sectionComponents": { "sidebar": ["ui/sidebar.js"] }
//! }
//! ```
//!
//! [`PluginManifest`] is the typed form of that file, paths still relative.
//! [`ResolvedManifest`] is what the loader hands on: every path rooted in the
//! plugin directory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::plugin::PluginId;
use crate::security;

/// Anything the dependency resolver can order.
pub trait PluginDescriptor {
    /// The plugin's id.
    fn id(&self) -> &PluginId;
    /// Ids of the plugins it depends on, in declaration order.
    fn depends_on(&self) -> &[PluginId];
}

/// A plugin author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginAuthor {
    /// Display name.
    pub name: String,
    /// Homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Contact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Renders `Name <email> (website)`, leaving out the parts that are missing.
impl fmt::Display for PluginAuthor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            write!(f, " <{email}>")?;
        }
        if let Some(website) = self.website.as_deref().filter(|w| !w.is_empty()) {
            write!(f, " ({website})")?;
        }
        Ok(())
    }
}

/// Join authors for a one-line listing.
#[must_use]
pub fn format_authors(authors: &[PluginAuthor]) -> String {
    authors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated `plugin.json`, paths still relative to the plugin directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique, vendor-prefixed id.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// `major.minor.patch` version.
    pub version: String,
    /// Authors, in listing order.
    #[serde(default)]
    pub authors: Vec<PluginAuthor>,
    /// Plugins that must be loaded first. Unknown names fail resolution.
    #[serde(default, deserialize_with = "dependency_references")]
    pub depends_on: Vec<PluginId>,
    /// Module stub for the plugin's code.
    pub entrypoint: String,
    /// Binding module stubs, applied before the entrypoint.
    #[serde(default)]
    pub additional_container_bindings: Vec<String>,
    /// UI contributions per section name.
    #[serde(default)]
    pub section_components: BTreeMap<String, Vec<String>>,
}

fn dependency_references<'de, D>(deserializer: D) -> Result<Vec<PluginId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .into_iter()
        .map(|id| PluginId::reference(id).map_err(serde::de::Error::custom))
        .collect()
}

impl PluginManifest {
    /// Root every path in `plugin_dir`.
    ///
    /// `plugin_dir` must be absolute. Returns the first path that would end up
    /// outside `plugin_dir` as the error.
    ///
    /// # Errors
    ///
    /// Returns the offending relative path if any field escapes the directory.
    pub fn resolve_in(self, plugin_dir: &Path) -> Result<ResolvedManifest, String> {
        let plugin_dir = security::normalize_lexically(plugin_dir);
        let root = |rel: &str| {
            security::resolve_within(&plugin_dir, rel).ok_or_else(|| rel.to_string())
        };

        let entrypoint = root(self.entrypoint.as_str())?;
        let additional_container_bindings = self
            .additional_container_bindings
            .iter()
            .map(|p| root(p.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut section_components = BTreeMap::new();
        for (section, paths) in &self.section_components {
            let resolved = paths
                .iter()
                .map(|p| root(p.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            section_components.insert(section.clone(), resolved);
        }

        Ok(ResolvedManifest {
            id: self.id,
            name: self.name,
            version: self.version,
            authors: self.authors,
            depends_on: self.depends_on,
            entrypoint,
            additional_container_bindings,
            section_components,
            plugin_dir,
        })
    }
}

impl PluginDescriptor for PluginManifest {
    fn id(&self) -> &PluginId {
        &self.id
    }

    fn depends_on(&self) -> &[PluginId] {
        &self.depends_on
    }
}

/// A manifest with every path made absolute. Produced by a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedManifest {
    /// Unique, vendor-prefixed id.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// `major.minor.patch` version.
    pub version: String,
    /// Authors, in listing order.
    pub authors: Vec<PluginAuthor>,
    /// Plugins that must be loaded first.
    pub depends_on: Vec<PluginId>,
    /// Absolute path of the entrypoint module stub.
    pub entrypoint: PathBuf,
    /// Absolute paths of the binding module stubs.
    pub additional_container_bindings: Vec<PathBuf>,
    /// Absolute paths of the UI contributions per section.
    pub section_components: BTreeMap<String, Vec<PathBuf>>,
    /// The directory the plugin was discovered in.
    pub plugin_dir: PathBuf,
}

impl ResolvedManifest {
    /// Every referenced path, entrypoint first.
    pub fn all_paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.entrypoint.as_path())
            .chain(self.additional_container_bindings.iter().map(PathBuf::as_path))
            .chain(self.section_components.values().flatten().map(PathBuf::as_path))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: &str) -> Self {
        let plugin_dir = PathBuf::from("/plugins").join(id);
        Self {
            id: PluginId::from_static(id),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            authors: Vec::new(),
            depends_on: Vec::new(),
            entrypoint: plugin_dir.join("main.toml"),
            additional_container_bindings: Vec::new(),
            section_components: BTreeMap::new(),
            plugin_dir,
        }
    }
}

impl PluginDescriptor for ResolvedManifest {
    fn id(&self) -> &PluginId {
        &self.id
    }

    fn depends_on(&self) -> &[PluginId] {
        &self.depends_on
    }
}
