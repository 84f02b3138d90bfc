//! Environment variable overrides.
//!
//! Env vars are the top layer: a set variable replaces whatever the files
//! said.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Prefix shared by every variable this crate reads.
pub const ENV_PREFIX: &str = "BOTVY_";

/// How a variable's text becomes a TOML value.
#[derive(Debug, Clone, Copy)]
enum EnvKind {
    /// Taken as-is.
    Text,
    /// Comma-separated, trimmed, empty entries dropped.
    List,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: EnvKind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "BOTVY_PLUGINS_DIR",
        field_path: "plugins.directory",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "BOTVY_ACTIVE_PLUGINS",
        field_path: "plugins.active",
        kind: EnvKind::List,
    },
    EnvMapping {
        var_name: "BOTVY_LOG_LEVEL",
        field_path: "logging.level",
        kind: EnvKind::Text,
    },
    EnvMapping {
        var_name: "BOTVY_LOG_FORMAT",
        field_path: "logging.format",
        kind: EnvKind::Text,
    },
];

/// Snapshot the `BOTVY_*` variables of this process.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply every mapped variable present in `env_vars` to `merged`.
///
/// Returns the number of variables applied.
pub fn apply_env_overrides<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var override"
        );

        set_field(merged, mapping.field_path, coerce(raw, mapping.kind));
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    count
}

fn coerce(raw: &str, kind: EnvKind) -> toml::Value {
    match kind {
        EnvKind::Text => toml::Value::String(raw.to_owned()),
        EnvKind::List => toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_owned()))
                .collect(),
        ),
    }
}

/// Set a dotted field, creating intermediate tables. A non-table in the way
/// leaves the tree untouched.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment)
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);

        let applied = apply_env_overrides(
            &mut merged,
            &mut sources,
            &env(&[("BOTVY_LOG_LEVEL", "trace"), ("UNRELATED", "x")]),
        );

        assert_eq!(applied, 1);
        assert_eq!(merged["logging"]["level"].as_str(), Some("trace"));
        assert_eq!(
            sources.get("logging.level"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn active_list_is_split_on_commas() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();
        apply_env_overrides(
            &mut merged,
            &mut sources,
            &env(&[("BOTVY_ACTIVE_PLUGINS", " a.one, ,b.two ,")]),
        );

        let active: Vec<&str> = merged["plugins"]["active"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(toml::Value::as_str)
            .collect();
        assert_eq!(active, vec!["a.one", "b.two"]);
    }

    #[test]
    fn scalar_in_the_way_is_left_alone() {
        let mut merged: toml::Value = toml::from_str("plugins = 3\n").unwrap();
        set_field(&mut merged, "plugins.directory", toml::Value::from("x"));
        assert_eq!(merged["plugins"].as_integer(), Some(3));
    }
}
