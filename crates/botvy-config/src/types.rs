//! Configuration types for the Botvy plugin host.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header produces a working
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use botvy_plugins::{InitializationSide, PluginId};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where plugins live and which of them run.
    pub plugins: PluginsSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// PluginsSection
// ---------------------------------------------------------------------------

/// Plugin discovery and startup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsSection {
    /// Root directory scanned for plugin subdirectories. Relative paths are
    /// resolved against the workspace root.
    pub directory: PathBuf,
    /// Plugin ids to load. `None` loads everything that was discovered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<Vec<String>>,
    /// `"client"` or `"server"`.
    pub side: String,
    /// Per-plugin `initialize` limit in seconds. Unlimited when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_timeout_secs: Option<u64>,
}

impl Default for PluginsSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("plugins"),
            active: None,
            side: "client".to_owned(),
            init_timeout_secs: None,
        }
    }
}

impl PluginsSection {
    /// The plugins directory, resolved against `base` when relative.
    #[must_use]
    pub fn directory_in(&self, base: &Path) -> PathBuf {
        if self.directory.is_absolute() {
            self.directory.clone()
        } else {
            base.join(&self.directory)
        }
    }

    /// The activation list as plugin ids.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an entry that is not a
    /// valid plugin id.
    pub fn active_ids(&self) -> ConfigResult<Option<Vec<PluginId>>> {
        self.active
            .as_ref()
            .map(|ids| {
                ids.iter()
                    .map(|id| {
                        PluginId::new(id.as_str()).map_err(|e| ConfigError::Invalid {
                            field: "plugins.active".to_owned(),
                            message: e.to_string(),
                        })
                    })
                    .collect()
            })
            .transpose()
    }

    /// The initialization side.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `side` is neither
    /// `client` nor `server`.
    pub fn side(&self) -> ConfigResult<InitializationSide> {
        self.side
            .parse()
            .map_err(|_| ConfigError::Invalid {
                field: "plugins.side".to_owned(),
                message: format!(
                    "unsupported side '{}'; expected one of: client, server",
                    self.side
                ),
            })
    }

    /// The per-plugin initialization limit.
    #[must_use]
    pub fn init_timeout(&self) -> Option<Duration> {
        self.init_timeout_secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["botvy_plugins=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_sections_use_defaults() {
        let config: Config = toml::from_str("[plugins]\n[logging]\n").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn directory_is_resolved_against_base() {
        let mut section = PluginsSection::default();
        assert_eq!(
            section.directory_in(Path::new("/work")),
            PathBuf::from("/work/plugins")
        );

        section.directory = PathBuf::from("/opt/botvy/plugins");
        assert_eq!(
            section.directory_in(Path::new("/work")),
            PathBuf::from("/opt/botvy/plugins")
        );
    }

    #[test]
    fn active_ids_are_checked() {
        let mut section = PluginsSection::default();
        assert!(section.active_ids().unwrap().is_none());

        section.active = Some(vec!["botvy.core.log".to_owned()]);
        let ids = section.active_ids().unwrap().unwrap();
        assert_eq!(ids[0].as_str(), "botvy.core.log");

        section.active = Some(vec!["not an id".to_owned()]);
        assert!(matches!(
            section.active_ids(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn side_and_timeout_accessors() {
        let mut section = PluginsSection {
            side: "Server".to_owned(),
            init_timeout_secs: Some(5),
            ..PluginsSection::default()
        };
        assert_eq!(section.side().unwrap(), InitializationSide::Server);
        assert_eq!(section.init_timeout(), Some(Duration::from_secs(5)));

        section.side = "sideways".to_owned();
        assert!(section.side().is_err());
    }
}
