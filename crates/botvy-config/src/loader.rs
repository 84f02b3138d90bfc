//! Reading the config layers and folding them into one [`Config`].
//!
//! Every layer is merged as a raw TOML tree first. The typed [`Config`] is
//! only deserialized, then range-checked, once the environment has been
//! applied on top.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Bottom layer.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Layers larger than this are rejected unread.
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// File name of the workspace layer.
pub const WORKSPACE_CONFIG_FILE: &str = "botvy.toml";

/// A loaded configuration together with where its values came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Dotted field path → which layer set the value.
    pub field_sources: FieldSources,
    /// Config files that were loaded, lowest precedence first.
    pub loaded_files: Vec<PathBuf>,
}

impl ResolvedConfig {
    /// The layer that set `field` (e.g. `"plugins.directory"`).
    #[must_use]
    pub fn source_of(&self, field: &str) -> Option<ConfigLayer> {
        self.field_sources.get(field).copied()
    }
}

/// Merge defaults, the user file, the workspace file and the process
/// environment.
///
/// No workspace layer is read when `workspace_root` is `None`.
/// `botvy_home_override` stands in for `~/.botvy`.
///
/// # Errors
///
/// Any layer that is unreadable or malformed, and any out-of-range value in
/// the merged result.
pub fn load(
    workspace_root: Option<&Path>,
    botvy_home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let botvy_home = match botvy_home_override {
        Some(h) => h.to_path_buf(),
        None => home_directory()?.join(".botvy"),
    };
    load_with_env(workspace_root, &botvy_home, &collect_env_vars())
}

/// [`load`] with an explicit `~/.botvy` directory and environment.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_with_env<S: BuildHasher>(
    workspace_root: Option<&Path>,
    botvy_home: &Path,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::Malformed {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", ConfigLayer::Defaults, &mut field_sources);

    // Missing files are skipped.
    let layers = [
        Some((botvy_home.join("config.toml"), ConfigLayer::User)),
        workspace_root.map(|root| (root.join(WORKSPACE_CONFIG_FILE), ConfigLayer::Workspace)),
    ];
    for (path, layer) in layers.into_iter().flatten() {
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge_tracking(&mut merged, &overlay, "", layer, &mut field_sources);
            info!(path = %path.display(), layer = %layer, "loaded config file");
            loaded_files.push(path);
        }
    }

    let env_count = apply_env_overrides(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable overrides");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Malformed {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Read `path` alone. Fields the file leaves out take their serde defaults.
///
/// # Errors
///
/// A missing file is [`ConfigError::Unreadable`], unlike in [`load`].
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::Unreadable {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;

    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Malformed {
            path: path.display().to_string(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

/// `Ok(None)` when `path` does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::Unreadable {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid {
            field: path.display().to_string(),
            message: format!(
                "config file is {size} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::Malformed {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::HomeUnknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn defaults_deserialize_to_default_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn defaults_only_when_no_files_exist() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();

        let resolved = load_with_env(Some(ws.path()), home.path(), &no_env()).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.source_of("plugins.directory"),
            Some(ConfigLayer::Defaults)
        );
    }

    #[test]
    fn layers_apply_in_precedence_order() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            r#"
            [plugins]
            directory = "user-plugins"
            init_timeout_secs = 5
            [logging]
            level = "debug"
            format = "compact"
            "#,
        )
        .unwrap();
        std::fs::write(
            ws.path().join(WORKSPACE_CONFIG_FILE),
            r#"
            [plugins]
            directory = "ws-plugins"
            active = ["botvy.core.log"]
            "#,
        )
        .unwrap();
        let env: HashMap<String, String> =
            HashMap::from([("BOTVY_LOG_FORMAT".to_owned(), "json".to_owned())]);

        let resolved = load_with_env(Some(ws.path()), home.path(), &env).unwrap();
        let config = &resolved.config;

        assert_eq!(config.plugins.side, "client");
        assert_eq!(config.plugins.init_timeout_secs, Some(5));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.plugins.directory, PathBuf::from("ws-plugins"));
        assert_eq!(
            config.plugins.active.as_deref(),
            Some(&["botvy.core.log".to_owned()][..])
        );
        assert_eq!(config.logging.format, "json");

        assert_eq!(resolved.source_of("plugins.side"), Some(ConfigLayer::Defaults));
        assert_eq!(resolved.source_of("logging.level"), Some(ConfigLayer::User));
        assert_eq!(
            resolved.source_of("plugins.directory"),
            Some(ConfigLayer::Workspace)
        );
        assert_eq!(
            resolved.source_of("logging.format"),
            Some(ConfigLayer::Environment)
        );
        assert_eq!(
            resolved.loaded_files,
            vec![
                home.path().join("config.toml"),
                ws.path().join(WORKSPACE_CONFIG_FILE)
            ]
        );
    }

    #[test]
    fn env_wins_over_workspace() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(
            ws.path().join(WORKSPACE_CONFIG_FILE),
            "[plugins]\nactive = [\"a.one\"]\n",
        )
        .unwrap();
        let env: HashMap<String, String> = HashMap::from([
            ("BOTVY_ACTIVE_PLUGINS".to_owned(), "b.two,c.three".to_owned()),
            ("BOTVY_PLUGINS_DIR".to_owned(), "/srv/plugins".to_owned()),
        ]);

        let config = load_with_env(Some(ws.path()), home.path(), &env)
            .unwrap()
            .config;
        assert_eq!(
            config.plugins.active,
            Some(vec!["b.two".to_owned(), "c.three".to_owned()])
        );
        assert_eq!(config.plugins.directory, PathBuf::from("/srv/plugins"));
    }

    #[test]
    fn merged_config_is_validated() {
        let home = tempfile::tempdir().unwrap();
        let env: HashMap<String, String> =
            HashMap::from([("BOTVY_LOG_LEVEL".to_owned(), "chatty".to_owned())]);

        let result = load_with_env(None, home.path(), &env);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { ref field, .. }) if field == "logging.level"
        ));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[plugins\n").unwrap();

        let result = load_with_env(None, home.path(), &no_env());
        assert!(matches!(result, Err(ConfigError::Malformed { .. })));
    }

    #[test]
    fn wrong_field_type_is_a_parse_error() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[plugins]\ninit_timeout_secs = \"soon\"\n",
        )
        .unwrap();

        let result = load_with_env(None, home.path(), &no_env());
        assert!(matches!(
            result,
            Err(ConfigError::Malformed { ref path, .. }) if path == "<merged config>"
        ));
    }

    #[test]
    fn load_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.plugins, crate::PluginsSection::default());
    }

    #[test]
    fn load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/botvy.toml"));
        assert!(matches!(result, Err(ConfigError::Unreadable { .. })));
    }

    #[test]
    fn oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::Invalid { .. })),
            "Expected Invalid for oversized config, got: {result:?}"
        );
    }
}
