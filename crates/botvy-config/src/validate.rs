//! Post-merge configuration validation.

use botvy_plugins::PluginId;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 4] = ["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_plugins(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_plugins(config: &Config) -> ConfigResult<()> {
    let p = &config.plugins;

    if p.directory.as_os_str().is_empty() {
        return Err(ConfigError::Invalid {
            field: "plugins.directory".to_owned(),
            message: "plugins directory must not be empty".to_owned(),
        });
    }

    p.side()?;

    if p.init_timeout_secs == Some(0) {
        return Err(ConfigError::Invalid {
            field: "plugins.init_timeout_secs".to_owned(),
            message: "init_timeout_secs must be greater than 0; omit it to disable the limit"
                .to_owned(),
        });
    }

    if let Some(bad) = p
        .active
        .iter()
        .flatten()
        .find(|id| !PluginId::is_valid_id(id))
    {
        return Err(ConfigError::Invalid {
            field: "plugins.active".to_owned(),
            message: format!("'{bad}' is not a valid plugin id"),
        });
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    if !VALID_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::Invalid {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                VALID_LEVELS.join(", ")
            ),
        });
    }

    if !VALID_FORMATS.contains(&config.logging.format.as_str()) {
        return Err(ConfigError::Invalid {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                VALID_FORMATS.join(", ")
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.plugins.init_timeout_secs = Some(0);
        assert_eq!(field_of(validate(&config)), "plugins.init_timeout_secs");

        config.plugins.init_timeout_secs = Some(10);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn unknown_side_is_rejected() {
        let mut config = Config::default();
        config.plugins.side = "both".to_owned();
        assert_eq!(field_of(validate(&config)), "plugins.side");
    }

    #[test]
    fn invalid_active_id_is_rejected() {
        let mut config = Config::default();
        config.plugins.active = Some(vec!["botvy.core.log".to_owned(), "nodots".to_owned()]);
        assert_eq!(field_of(validate(&config)), "plugins.active");
    }

    #[test]
    fn logging_level_and_format_are_checked() {
        let mut config = Config::default();
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");

        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }

    #[test]
    fn empty_directory_is_rejected() {
        let mut config = Config::default();
        config.plugins.directory = std::path::PathBuf::new();
        assert_eq!(field_of(validate(&config)), "plugins.directory");
    }
}
