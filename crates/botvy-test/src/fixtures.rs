//! On-disk plugin fixtures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

use botvy_plugins::MANIFEST_FILE_NAME;

use crate::harness::temp_root;

/// Description of a plugin to write into a [`PluginDirBuilder`].
///
/// The entrypoint is always `main.toml`, a module stub naming [`export`]
/// (the plugin id unless overridden). Each binding export gets a stub under
/// `bindings/`.
///
/// [`export`]: PluginFixture::export
#[derive(Debug, Clone)]
pub struct PluginFixture {
    id: String,
    name: String,
    version: String,
    dir_name: String,
    export: String,
    depends_on: Vec<String>,
    bindings: Vec<String>,
    sections: BTreeMap<String, Vec<String>>,
    authors: Vec<Value>,
}

impl PluginFixture {
    /// A minimal valid plugin with id `id`.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            dir_name: id.to_string(),
            export: id.to_string(),
            depends_on: Vec::new(),
            bindings: Vec::new(),
            sections: BTreeMap::new(),
            authors: Vec::new(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Version string, written as-is.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Directory name under the plugins root.
    #[must_use]
    pub fn dir_name(mut self, dir_name: &str) -> Self {
        self.dir_name = dir_name.to_string();
        self
    }

    /// Export the entrypoint stub names.
    #[must_use]
    pub fn export(mut self, export: &str) -> Self {
        self.export = export.to_string();
        self
    }

    /// Plugin ids this plugin depends on.
    #[must_use]
    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on = ids.iter().map(ToString::to_string).collect();
        self
    }

    /// Add a binding module stub naming `export`.
    #[must_use]
    pub fn binding(mut self, export: &str) -> Self {
        self.bindings.push(export.to_string());
        self
    }

    /// Add a UI contribution file under `section`.
    #[must_use]
    pub fn section(mut self, section: &str, path: &str) -> Self {
        self.sections
            .entry(section.to_string())
            .or_default()
            .push(path.to_string());
        self
    }

    /// Add an author.
    #[must_use]
    pub fn author(mut self, name: &str, email: Option<&str>) -> Self {
        let mut author = json!({ "name": name });
        if let Some(email) = email {
            author["email"] = json!(email);
        }
        self.authors.push(author);
        self
    }

    /// The plugin id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn binding_paths(&self) -> Vec<String> {
        (0..self.bindings.len())
            .map(|i| format!("bindings/{i}.toml"))
            .collect()
    }

    /// The `plugin.json` contents.
    #[must_use]
    pub fn manifest(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "version": self.version,
            "authors": self.authors,
            "dependsOn": self.depends_on,
            "entrypoint": "main.toml",
            "additionalContainerBindings": self.binding_paths(),
            "sectionComponents": self.sections,
        })
    }
}

/// A temporary plugins root directory.
#[derive(Debug)]
pub struct PluginDirBuilder {
    dir: TempDir,
}

impl PluginDirBuilder {
    /// Create an empty plugins root.
    #[must_use]
    pub fn new() -> Self {
        Self { dir: temp_root() }
    }

    /// The plugins root.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a plugin: manifest, entrypoint stub, binding stubs and section files.
    ///
    /// Returns the plugin directory.
    ///
    /// # Panics
    ///
    /// Panics if any file cannot be written.
    pub fn add(&self, fixture: &PluginFixture) -> PathBuf {
        let dir = self.add_manifest(&fixture.dir_name, &fixture.manifest());

        write_stub(&dir.join("main.toml"), &fixture.export);
        for (path, export) in fixture.binding_paths().iter().zip(&fixture.bindings) {
            write_stub(&dir.join(path), export);
        }
        for path in fixture.sections.values().flatten() {
            self.write(&dir.join(path), "");
        }
        dir
    }

    /// Write only a `plugin.json` with arbitrary contents.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn add_manifest(&self, dir_name: &str, manifest: &Value) -> PathBuf {
        let contents =
            serde_json::to_string_pretty(manifest).expect("Failed to serialize manifest");
        self.add_raw_manifest(dir_name, &contents)
    }

    /// Write a `plugin.json` with raw text, e.g. malformed JSON.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn add_raw_manifest(&self, dir_name: &str, contents: &str) -> PathBuf {
        let dir = self.dir.path().join(dir_name);
        self.write(&dir.join(MANIFEST_FILE_NAME), contents);
        dir
    }

    /// Create an empty subdirectory.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    pub fn add_empty_dir(&self, dir_name: &str) -> PathBuf {
        let dir = self.dir.path().join(dir_name);
        std::fs::create_dir_all(&dir).expect("Failed to create directory");
        dir
    }

    /// Write a file, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write(&self, path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, contents).expect("Failed to write file");
    }
}

impl Default for PluginDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a module stub naming `export`.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_stub(path: &Path, export: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(path, format!("default = \"{export}\"\n")).expect("Failed to write stub");
}
