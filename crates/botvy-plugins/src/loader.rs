//! Plugin discovery.
//!
//! A [`PluginLoader`] produces resolved manifests. The only strategy shipped
//! here is [`DirectoryPluginLoader`]: one subdirectory of a root directory per
//! plugin, each with a `plugin.json` at its top.
//!
//! Candidates are isolated from each other. A directory without a manifest, a
//! manifest that does not parse or validate, a path that escapes the plugin
//! directory, or a missing entrypoint only drops that one candidate.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::error::{PluginError, PluginResult};
use crate::manifest::{PluginManifest, ResolvedManifest};
use crate::plugin::PluginId;
use crate::schema::{self, Diagnostic, DiagnosticSink, TracingSink};
use crate::security;

/// Standard plugin manifest file name.
pub const MANIFEST_FILE_NAME: &str = "plugin.json";

/// A source of plugin manifests.
#[async_trait]
pub trait PluginLoader: Send + Sync {
    /// Human-readable loader name.
    fn name(&self) -> &str;

    /// Discover plugins.
    ///
    /// # Errors
    ///
    /// Returns an error only if discovery as a whole is impossible. Broken
    /// candidates are skipped.
    async fn load_plugins(&self) -> PluginResult<Vec<ResolvedManifest>>;
}

/// Why a single candidate directory was rejected.
#[derive(Debug, thiserror::Error)]
pub enum CandidateError {
    /// The directory has no `plugin.json`.
    #[error("the directory {} does not contain a \"plugin.json\" file", .dir.display())]
    MissingManifest {
        /// The candidate directory.
        dir: PathBuf,
    },

    /// A file could not be read.
    #[error("could not read {}: {source}", .path.display())]
    Read {
        /// The file or directory.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The manifest is not well-formed JSON or does not fit the manifest shape.
    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        /// The manifest file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The manifest failed schema validation.
    #[error("the plugin.json at {} is not valid ({} problem(s))", .path.display(), .diagnostics.len())]
    Invalid {
        /// The manifest file.
        path: PathBuf,
        /// One entry per violated rule.
        diagnostics: Vec<Diagnostic>,
    },

    /// A referenced path resolves outside the plugin directory.
    #[error("a path of plugin {plugin_id} is outside of the plugin directory: {path}")]
    PathEscape {
        /// The plugin.
        plugin_id: PluginId,
        /// The offending path as written or resolved.
        path: String,
    },

    /// The entrypoint does not exist or is not a file.
    #[error("the entrypoint of plugin {plugin_id} does not exist: {}", .path.display())]
    MissingEntrypoint {
        /// The plugin.
        plugin_id: PluginId,
        /// The resolved entrypoint path.
        path: PathBuf,
    },
}

/// Loads plugins from the subdirectories of one root directory.
#[derive(Debug, Clone)]
pub struct DirectoryPluginLoader {
    name: String,
    directory: PathBuf,
}

impl DirectoryPluginLoader {
    /// Create a loader for `directory`. A relative path is taken from the
    /// current working directory.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            name: "Directory plugin loader".to_string(),
            directory: directory.into(),
        }
    }

    /// Override the loader name used in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The configured root directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Make sure the root exists, creating it if needed, and return it absolute.
    async fn ensure_directory(&self) -> PluginResult<PathBuf> {
        let root = security::normalize_lexically(&std::path::absolute(&self.directory)?);

        if tokio::fs::metadata(&root).await.is_err() {
            debug!(path = %root.display(), "Plugin directory does not exist, creating it");
            tokio::fs::create_dir_all(&root)
                .await
                .map_err(|source| PluginError::DirectoryCreate {
                    path: root.clone(),
                    source,
                })?;
            info!(path = %root.display(), "Created plugin directory");
        }

        Ok(root)
    }

    /// Immediate children of `root`, sorted by file name.
    async fn list_children(root: &Path) -> PluginResult<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(root).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            children.push(entry.path());
        }
        children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(children)
    }

    /// Load and check a single plugin directory.
    ///
    /// This runs every check the loader applies to a candidate and reports
    /// the first one that fails.
    ///
    /// # Errors
    ///
    /// Returns the reason the candidate would be skipped.
    pub async fn load_candidate(dir: &Path) -> Result<ResolvedManifest, CandidateError> {
        let dir = std::path::absolute(dir)
            .map(|d| security::normalize_lexically(&d))
            .map_err(|source| CandidateError::Read {
                path: dir.to_path_buf(),
                source,
            })?;
        let manifest_path = dir.join(MANIFEST_FILE_NAME);

        let contents = match tokio::fs::read_to_string(&manifest_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CandidateError::MissingManifest { dir });
            },
            Err(source) => {
                return Err(CandidateError::Read {
                    path: manifest_path,
                    source,
                });
            },
        };
        trace!(path = %manifest_path.display(), "Read plugin descriptor");

        let raw: Value =
            serde_json::from_str(&contents).map_err(|source| CandidateError::Parse {
                path: manifest_path.clone(),
                source,
            })?;

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        if !schema::validate(schema::plugin_descriptor_schema(), &raw, &mut diagnostics) {
            return Err(CandidateError::Invalid {
                path: manifest_path,
                diagnostics,
            });
        }
        trace!(path = %manifest_path.display(), "Validated plugin descriptor");

        let manifest: PluginManifest =
            serde_json::from_value(raw).map_err(|source| CandidateError::Parse {
                path: manifest_path.clone(),
                source,
            })?;
        let plugin_id = manifest.id.clone();

        let resolved = manifest
            .resolve_in(&dir)
            .map_err(|path| CandidateError::PathEscape {
                plugin_id: plugin_id.clone(),
                path,
            })?;

        // Lexical rewriting cannot produce an escape after resolve_in, but the
        // prefix is checked again on the final values.
        if let Some(escaped) = resolved.all_paths().find(|p| !p.starts_with(&dir)) {
            return Err(CandidateError::PathEscape {
                plugin_id,
                path: escaped.display().to_string(),
            });
        }
        trace!(
            plugin_id = %plugin_id,
            entrypoint = %resolved.entrypoint.display(),
            "Resolved paths"
        );

        Self::check_paths(&dir, &resolved).await?;

        Ok(resolved)
    }

    /// The entrypoint must be a file. Every referenced path that exists,
    /// entrypoint included, must really live inside the real plugin directory.
    async fn check_paths(dir: &Path, manifest: &ResolvedManifest) -> Result<(), CandidateError> {
        let missing = || CandidateError::MissingEntrypoint {
            plugin_id: manifest.id.clone(),
            path: manifest.entrypoint.clone(),
        };

        match tokio::fs::metadata(&manifest.entrypoint).await {
            Ok(meta) if meta.is_file() => {},
            _ => return Err(missing()),
        }

        let real_dir = tokio::fs::canonicalize(dir)
            .await
            .map_err(|source| CandidateError::Read {
                path: dir.to_path_buf(),
                source,
            })?;

        for path in manifest.all_paths() {
            let real = match tokio::fs::canonicalize(path).await {
                Ok(real) => real,
                Err(_) if path == manifest.entrypoint.as_path() => return Err(missing()),
                Err(e) => {
                    trace!(path = %path.display(), error = %e, "Referenced path not on disk");
                    continue;
                },
            };
            if !real.starts_with(&real_dir) {
                return Err(CandidateError::PathEscape {
                    plugin_id: manifest.id.clone(),
                    path: real.display().to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PluginLoader for DirectoryPluginLoader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_plugins(&self) -> PluginResult<Vec<ResolvedManifest>> {
        let root = self.ensure_directory().await?;
        debug!(loader = %self.name, path = %root.display(), "Plugins directory");

        let children = Self::list_children(&root).await?;
        if children.is_empty() {
            warn!(path = %root.display(), "The plugin directory does not contain any plugins");
            return Ok(Vec::new());
        }
        trace!(count = children.len(), "Listed plugin directory");

        let mut found = Vec::new();
        for child in children {
            match tokio::fs::metadata(&child).await {
                Ok(meta) if meta.is_dir() => {},
                _ => {
                    debug!(path = %child.display(), "Skipping non-directory entry");
                    continue;
                },
            }

            match Self::load_candidate(&child).await {
                Ok(manifest) => {
                    info!(plugin_id = %manifest.id, path = %child.display(), "Found plugin");
                    found.push(manifest);
                },
                Err(e @ CandidateError::MissingManifest { .. }) => {
                    warn!(path = %child.display(), "{e}");
                },
                Err(CandidateError::Invalid { path, diagnostics }) => {
                    let mut sink = TracingSink::new(path.display().to_string());
                    for diagnostic in diagnostics {
                        sink.report(diagnostic);
                    }
                    error!(path = %child.display(), "The plugin.json in this directory is not valid");
                },
                Err(e) => {
                    error!(path = %child.display(), error = %e, "Rejected plugin candidate");
                },
            }
        }

        Ok(found)
    }
}
