//! What a plugin sees while it initializes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::plugin::PluginId;
use crate::registry::ServiceRegistry;

/// Which half of the application is bringing plugins up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitializationSide {
    /// The desktop client.
    #[default]
    Client,
    /// The background server.
    Server,
}

impl fmt::Display for InitializationSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}

impl FromStr for InitializationSide {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            other => Err(PluginError::ExecutionFailed(format!(
                "unknown initialization side: {other}"
            ))),
        }
    }
}

/// Context handed to [`PluginModule::initialize`](crate::PluginModule::initialize).
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    plugin_id: &'a PluginId,
    side: InitializationSide,
    registry: &'a ServiceRegistry,
}

impl<'a> PluginContext<'a> {
    /// Create a context for one plugin.
    #[must_use]
    pub fn new(
        plugin_id: &'a PluginId,
        side: InitializationSide,
        registry: &'a ServiceRegistry,
    ) -> Self {
        Self {
            plugin_id,
            side,
            registry,
        }
    }

    /// The plugin being initialized.
    #[must_use]
    pub fn plugin_id(&self) -> &PluginId {
        self.plugin_id
    }

    /// Client or server.
    #[must_use]
    pub fn side(&self) -> InitializationSide {
        self.side
    }

    /// Shared services, read-only once loading is done.
    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        self.registry
    }
}
