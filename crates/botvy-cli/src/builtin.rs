//! Plugin code compiled into the `botvy` binary.
//!
//! A plugin directory picks one of these by naming it in its entrypoint stub,
//! e.g. `default = "botvy.core.log"`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use botvy_plugins::{
    ModuleTable, PluginContext, PluginModule, PluginResult, ServiceRegistry, services,
};
use tracing::info;

/// Export name of the sample logging plugin.
pub(crate) const CORE_LOG_PLUGIN: &str = "botvy.core.log";

/// Logs one line when it comes up.
struct CoreLogPlugin {
    cwd: Option<Arc<PathBuf>>,
}

#[async_trait]
impl PluginModule for CoreLogPlugin {
    async fn initialize(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()> {
        let cwd = self
            .cwd
            .as_deref()
            .map_or_else(|| "<unknown>".to_owned(), |p| p.display().to_string());
        info!(
            plugin_id = %ctx.plugin_id(),
            side = %ctx.side(),
            cwd = %cwd,
            "Core log plugin ready"
        );
        Ok(())
    }
}

fn core_log_factory(registry: &ServiceRegistry) -> PluginResult<Box<dyn PluginModule>> {
    let cwd = registry
        .get::<PathBuf>(services::CURRENT_WORKING_DIRECTORY)
        .ok();
    Ok(Box::new(CoreLogPlugin { cwd }))
}

/// Every export the binary ships.
pub(crate) fn builtin_modules() -> ModuleTable {
    ModuleTable::new().with_plugin(CORE_LOG_PLUGIN, core_log_factory)
}
