use std::collections::HashMap;
use std::fmt;

/// One of the four places a config value can come from, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// `defaults.toml`.
    Defaults,
    /// `~/.botvy/config.toml`.
    User,
    /// `{workspace}/botvy.toml`.
    Workspace,
    /// A `BOTVY_*` variable.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user (~/.botvy/config.toml)"),
            Self::Workspace => write!(f, "workspace (botvy.toml)"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Dotted leaf path to the layer that last wrote it.
pub type FieldSources = HashMap<String, ConfigLayer>;

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Deep-merge `overlay` into `base`, recording which layer set each leaf.
///
/// Tables merge per key. Scalars and arrays from the overlay replace the base
/// value.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = join_path(prefix, key);
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    record_leaves(overlay_val, &path, layer, sources);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            record_leaves(overlay, prefix, layer, sources);
        },
    }
}

/// Record every leaf under `val` as set by `layer`.
pub fn record_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &join_path(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn tables_merge_and_leaves_replace() {
        let mut base = parse(
            r#"
            [plugins]
            directory = "plugins"
            side = "client"
            [logging]
            directives = ["a=debug", "b=warn"]
        "#,
        );
        let overlay = parse(
            r#"
            [plugins]
            directory = "elsewhere"
            [logging]
            directives = ["c=trace"]
        "#,
        );

        let mut sources = FieldSources::new();
        deep_merge_tracking(&mut base, &overlay, "", ConfigLayer::User, &mut sources);

        assert_eq!(base["plugins"]["directory"].as_str(), Some("elsewhere"));
        assert_eq!(base["plugins"]["side"].as_str(), Some("client"));
        assert_eq!(base["logging"]["directives"].as_array().unwrap().len(), 1);
        assert_eq!(sources.get("plugins.directory"), Some(&ConfigLayer::User));
        assert_eq!(sources.get("logging.directives"), Some(&ConfigLayer::User));
        assert!(!sources.contains_key("plugins.side"));
    }

    #[test]
    fn new_tables_record_every_leaf() {
        let mut base = parse("[logging]\nlevel = \"info\"\n");
        let overlay = parse("[plugins]\nactive = [\"a.b\"]\ninit_timeout_secs = 3\n");

        let mut sources = FieldSources::new();
        deep_merge_tracking(
            &mut base,
            &overlay,
            "",
            ConfigLayer::Workspace,
            &mut sources,
        );

        assert_eq!(
            sources.get("plugins.active"),
            Some(&ConfigLayer::Workspace)
        );
        assert_eq!(
            sources.get("plugins.init_timeout_secs"),
            Some(&ConfigLayer::Workspace)
        );
        assert_eq!(base["logging"]["level"].as_str(), Some("info"));
    }
}
