//! [`LogConfig`] and the subscriber built from it.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::error::{TelemetryError, TelemetryResult};

type FmtLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static>;

/// Line layout of the `fmt` layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, for a developer at a terminal.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event.
    Json,
    /// `tracing_subscriber`'s own default layout.
    Full,
}

impl LogFormat {
    const NAMES: [(&'static str, Self); 4] = [
        ("pretty", Self::Pretty),
        ("compact", Self::Compact),
        ("json", Self::Json),
        ("full", Self::Full),
    ];
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, format)| *format)
            .ok_or_else(|| TelemetryError::BadSetting(format!("no log format named `{s}`")))
    }
}

/// Where events are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Standard output.
    Stdout,
    /// Standard error.
    #[default]
    Stderr,
    /// A directory of files rotated daily, named `{prefix}.{date}`.
    Directory {
        /// Created on setup if missing.
        path: PathBuf,
        /// File name prefix.
        prefix: String,
    },
}

/// Everything [`setup_logging`] needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base filter, e.g. `info`.
    pub level: String,
    /// Layout.
    pub format: LogFormat,
    /// Destination.
    pub target: LogTarget,
    /// Extra per-target directives such as `botvy_plugins=debug`.
    pub directives: Vec<String>,
    /// Prefix events with the time.
    pub timestamps: bool,
    /// Emit color escapes. Ignored for [`LogTarget::Directory`].
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Pretty,
            target: LogTarget::Stderr,
            directives: Vec::new(),
            timestamps: true,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Defaults with `level` as the base filter.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// Replace [`LogConfig::format`].
    #[must_use]
    pub fn with_format(self, format: LogFormat) -> Self {
        Self { format, ..self }
    }

    /// Write to daily files under `path` instead of a stream.
    #[must_use]
    pub fn in_directory(self, path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let target = LogTarget::Directory {
            path: path.into(),
            prefix: prefix.into(),
        };
        Self { target, ..self }
    }

    /// Append one directive.
    #[must_use]
    pub fn with_directive(self, directive: impl Into<String>) -> Self {
        self.with_directives([directive])
    }

    /// Append several directives.
    #[must_use]
    pub fn with_directives<I, S>(mut self, directives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directives.extend(directives.into_iter().map(Into::into));
        self
    }

    /// Drop the time prefix.
    #[must_use]
    pub fn without_timestamps(self) -> Self {
        Self {
            timestamps: false,
            ..self
        }
    }

    fn filter(&self) -> TelemetryResult<EnvFilter> {
        let base = EnvFilter::try_new(&self.level)
            .map_err(|e| TelemetryError::BadSetting(e.to_string()))?;
        self.directives.iter().try_fold(base, |filter, raw| {
            let directive: Directive = raw
                .parse()
                .map_err(|e| TelemetryError::BadSetting(format!("directive `{raw}`: {e}")))?;
            Ok(filter.add_directive(directive))
        })
    }

    fn fmt_layer<W>(&self, writer: W, ansi: bool) -> FmtLayer
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
        match (self.format, self.timestamps) {
            (LogFormat::Pretty, true) => layer.pretty().boxed(),
            (LogFormat::Pretty, false) => layer.pretty().without_time().boxed(),
            (LogFormat::Compact, true) => layer.compact().boxed(),
            (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
            (LogFormat::Json, true) => layer.json().boxed(),
            (LogFormat::Json, false) => layer.json().without_time().boxed(),
            (LogFormat::Full, true) => layer.boxed(),
            (LogFormat::Full, false) => layer.without_time().boxed(),
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// [`TelemetryError::BadSetting`] for an unparsable filter,
/// [`TelemetryError::Io`] when the log directory cannot be created and
/// [`TelemetryError::SubscriberInstalled`] on a second call.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.filter()?;
    let layer = match &config.target {
        LogTarget::Stdout => config.fmt_layer(std::io::stdout, config.ansi),
        LogTarget::Stderr => config.fmt_layer(std::io::stderr, config.ansi),
        LogTarget::Directory { path, prefix } => {
            std::fs::create_dir_all(path)?;
            config.fmt_layer(tracing_appender::rolling::daily(path, prefix), false)
        },
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInstalled(e.to_string()))
}
