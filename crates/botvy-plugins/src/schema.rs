//! Declarative validation of raw plugin descriptors.
//!
//! A [`Schema`] is a small tree of object, string, array and map nodes. It is
//! checked against an untyped [`serde_json::Value`] before anything is
//! deserialized, so a rejected descriptor can be reported field by field.
//! Validation never fails with an error: invalid input is the expected case
//! and only yields `false` plus one [`Diagnostic`] per violated rule.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::plugin::PluginId;
use crate::security;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("invalid regex"));

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("invalid regex"));

static PLUGIN_DESCRIPTOR: LazyLock<Schema> = LazyLock::new(build_plugin_descriptor_schema);

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Location of the offending value, e.g. `authors[0].email`. Empty for the root.
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Receives diagnostics as they are produced.
pub trait DiagnosticSink {
    /// Record one diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Logs every diagnostic at `warn`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    source: String,
}

impl TracingSink {
    /// Create a sink that tags each line with `source` (usually a file path).
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        warn!(
            source = %self.source,
            field = %diagnostic.path,
            "Validation failed: {}",
            diagnostic.message
        );
    }
}

struct Discard;

impl DiagnosticSink for Discard {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

/// A rule applied to a string value.
#[derive(Debug, Clone)]
pub enum StringRule {
    /// Must not be empty.
    NonEmpty,
    /// Must contain a match for the regex.
    Pattern(Regex),
    /// Must look like an e-mail address.
    Email,
    /// Must parse as an absolute URI.
    Uri,
    /// Must be relative and never climb out of the plugin directory.
    PluginPath,
    /// Must be a well-formed [`PluginId`].
    PluginId,
}

impl StringRule {
    fn check(&self, value: &str) -> Option<String> {
        match self {
            Self::NonEmpty => value.is_empty().then(|| "must not be empty".to_string()),
            Self::Pattern(re) => {
                (!re.is_match(value)).then(|| format!("must match the pattern {}", re.as_str()))
            },
            Self::Email => (!EMAIL_PATTERN.is_match(value))
                .then(|| format!("\"{value}\" is not a valid e-mail address")),
            Self::Uri => url::Url::parse(value)
                .err()
                .map(|e| format!("\"{value}\" is not a valid URI: {e}")),
            Self::PluginPath => (!security::is_plugin_relative(value))
                .then(|| format!("\"{value}\" must stay inside the plugin directory")),
            Self::PluginId => (!PluginId::is_valid_id(value))
                .then(|| format!("\"{value}\" is not a valid plugin id")),
        }
    }
}

/// A named member of an object schema.
#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    required: bool,
    schema: Schema,
}

impl Field {
    /// A field that must be present.
    #[must_use]
    pub fn required(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            required: true,
            schema,
        }
    }

    /// A field that may be absent.
    #[must_use]
    pub fn optional(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            required: false,
            schema,
        }
    }
}

/// A schema node.
#[derive(Debug, Clone)]
pub enum Schema {
    /// A JSON object with known fields. Unknown keys are accepted.
    Object(Vec<Field>),
    /// A string with rules.
    String(Vec<StringRule>),
    /// An array whose items all match the inner schema.
    Array(Box<Schema>),
    /// An object used as a string-keyed map whose values match the inner schema.
    Map(Box<Schema>),
}

impl Schema {
    /// Object node.
    #[must_use]
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    /// String node.
    #[must_use]
    pub fn string(rules: impl IntoIterator<Item = StringRule>) -> Self {
        Self::String(rules.into_iter().collect())
    }

    /// Array node.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::Array(Box::new(items))
    }

    /// Map node.
    #[must_use]
    pub fn map(values: Schema) -> Self {
        Self::Map(Box::new(values))
    }

    fn check(&self, value: &Value, path: &str, sink: &mut dyn DiagnosticSink) -> bool {
        match (self, value) {
            (Self::Object(fields), Value::Object(map)) => {
                let mut ok = true;
                for field in fields {
                    let child = join_key(path, field.name);
                    match map.get(field.name) {
                        Some(v) => ok &= field.schema.check(v, &child, sink),
                        None if field.required => {
                            emit(sink, &child, "is required".to_string());
                            ok = false;
                        },
                        None => {},
                    }
                }
                ok
            },
            (Self::String(rules), Value::String(s)) => {
                let mut ok = true;
                for message in rules.iter().filter_map(|rule| rule.check(s)) {
                    emit(sink, path, message);
                    ok = false;
                }
                ok
            },
            (Self::Array(items), Value::Array(values)) => {
                let mut ok = true;
                for (i, v) in values.iter().enumerate() {
                    ok &= items.check(v, &format!("{path}[{i}]"), sink);
                }
                ok
            },
            (Self::Map(values), Value::Object(map)) => {
                let mut ok = true;
                for (key, v) in map {
                    ok &= values.check(v, &join_key(path, key), sink);
                }
                ok
            },
            (node, other) => {
                emit(
                    sink,
                    path,
                    format!("expected {}, found {}", node.kind(), value_kind(other)),
                );
                false
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Object(_) | Self::Map(_) => "an object",
            Self::String(_) => "a string",
            Self::Array(_) => "an array",
        }
    }
}

fn emit(sink: &mut dyn DiagnosticSink, path: &str, message: String) {
    sink.report(Diagnostic {
        path: path.to_string(),
        message,
    });
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Check `candidate` against `schema`, reporting each violation to `sink`.
///
/// Returns `true` when no rule was violated. `candidate` is never modified.
pub fn validate<S: DiagnosticSink + ?Sized>(
    schema: &Schema,
    candidate: &Value,
    sink: &mut S,
) -> bool {
    let mut forward = Forward(sink);
    schema.check(candidate, "", &mut forward)
}

/// [`validate`] without diagnostics.
#[must_use]
pub fn is_valid(schema: &Schema, candidate: &Value) -> bool {
    schema.check(candidate, "", &mut Discard)
}

struct Forward<'a, S: ?Sized>(&'a mut S);

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Forward<'_, S> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.0.report(diagnostic);
    }
}

/// The schema every `plugin.json` must satisfy.
#[must_use]
pub fn plugin_descriptor_schema() -> &'static Schema {
    &PLUGIN_DESCRIPTOR
}

fn build_plugin_descriptor_schema() -> Schema {
    let plugin_path = || Schema::string([StringRule::NonEmpty, StringRule::PluginPath]);
    let author = Schema::object([
        Field::required("name", Schema::string([StringRule::NonEmpty])),
        Field::optional("website", Schema::string([StringRule::Uri])),
        Field::optional("email", Schema::string([StringRule::Email])),
    ]);

    Schema::object([
        Field::required(
            "id",
            Schema::string([StringRule::NonEmpty, StringRule::PluginId]),
        ),
        Field::required("name", Schema::string([StringRule::NonEmpty])),
        Field::required(
            "version",
            Schema::string([StringRule::Pattern(VERSION_PATTERN.clone())]),
        ),
        Field::optional("authors", Schema::array(author)),
        Field::optional(
            "dependsOn",
            Schema::array(Schema::string([StringRule::NonEmpty])),
        ),
        Field::required("entrypoint", plugin_path()),
        Field::optional("additionalContainerBindings", Schema::array(plugin_path())),
        Field::optional(
            "sectionComponents",
            Schema::map(Schema::array(plugin_path())),
        ),
    ])
}
