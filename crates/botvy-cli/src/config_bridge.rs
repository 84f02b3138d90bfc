//! Bridge from `botvy_config::Config` to the types the host runs on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use botvy_config::Config;
use botvy_plugins::{InitializationSide, PluginId};
use botvy_telemetry::{LogConfig, LogFormat};

/// Load the configuration: a single file when `explicit` is given, the full
/// layered chain rooted at `workspace` otherwise.
pub(crate) fn load_config(explicit: Option<&Path>, workspace: &Path) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Config::load_file(path)
            .with_context(|| format!("failed to load config file {}", path.display())),
        None => Config::load(Some(workspace))
            .map(|resolved| resolved.config)
            .context("failed to load configuration"),
    }
}

/// Logging setup for `config`. `verbose` forces debug level.
pub(crate) fn to_log_config(config: &Config, verbose: bool) -> LogConfig {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    // Validation already rejected unknown formats.
    let format = config.logging.format.parse().unwrap_or(LogFormat::Pretty);

    LogConfig::new(level)
        .with_format(format)
        .with_directives(config.logging.directives.iter().cloned())
}

/// Everything the host needs to bring plugins up.
#[derive(Debug, Clone)]
pub(crate) struct HostSettings {
    /// Absolute plugins root.
    pub(crate) plugins_dir: PathBuf,
    /// Ids to load; everything when `None`.
    pub(crate) active: Option<Vec<PluginId>>,
    /// Client or server.
    pub(crate) side: InitializationSide,
    /// Per-plugin `initialize` limit.
    pub(crate) init_timeout: Option<Duration>,
}

impl HostSettings {
    /// Build settings from `config`, resolving a relative plugins directory
    /// against `workspace`. `dir_override` replaces the configured directory.
    pub(crate) fn from_config(
        config: &Config,
        workspace: &Path,
        dir_override: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let plugins = &config.plugins;
        let plugins_dir = match dir_override {
            Some(dir) if dir.is_absolute() => dir.to_path_buf(),
            Some(dir) => workspace.join(dir),
            None => plugins.directory_in(workspace),
        };

        Ok(Self {
            plugins_dir,
            active: plugins.active_ids()?,
            side: plugins.side()?,
            init_timeout: plugins.init_timeout(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_forces_debug() {
        let mut config = Config::default();
        config.logging.format = "json".to_owned();
        config.logging.directives = vec!["botvy_plugins=trace".to_owned()];

        let log = to_log_config(&config, true);
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["botvy_plugins=trace"]);

        assert_eq!(to_log_config(&config, false).level, "info");
    }

    #[test]
    fn settings_resolve_directory_and_overrides() {
        let mut config = Config::default();
        config.plugins.active = Some(vec!["botvy.core.log".to_owned()]);
        config.plugins.side = "server".to_owned();
        config.plugins.init_timeout_secs = Some(2);

        let settings = HostSettings::from_config(&config, Path::new("/work"), None).unwrap();
        assert_eq!(settings.plugins_dir, PathBuf::from("/work/plugins"));
        assert_eq!(settings.side, InitializationSide::Server);
        assert_eq!(settings.init_timeout, Some(Duration::from_secs(2)));
        assert_eq!(
            settings.active.unwrap()[0],
            PluginId::from_static("botvy.core.log")
        );

        let settings =
            HostSettings::from_config(&config, Path::new("/work"), Some(Path::new("other")))
                .unwrap();
        assert_eq!(settings.plugins_dir, PathBuf::from("/work/other"));
    }

    #[test]
    fn explicit_config_file_is_used_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[plugins]\ndirectory = \"from-file\"\n").unwrap();

        let config = load_config(Some(&path), dir.path()).unwrap();
        assert_eq!(config.plugins.directory, PathBuf::from("from-file"));

        let missing = dir.path().join("missing.toml");
        assert!(load_config(Some(&missing), dir.path()).is_err());
    }
}
