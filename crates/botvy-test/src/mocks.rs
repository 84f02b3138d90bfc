//! Plugin modules that record what happened to them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use botvy_plugins::{
    ContainerModule, ModuleTable, PluginContext, PluginError, PluginId, PluginModule,
    PluginResult, ServiceRegistry,
};

/// Shared, ordered record of `initialize` calls.
///
/// Uses `std::sync::Mutex` so it can be read from sync assertions without a
/// runtime.
#[derive(Debug, Clone, Default)]
pub struct InitLog {
    entries: Arc<Mutex<Vec<PluginId>>>,
}

impl InitLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` ran `initialize`.
    pub fn record(&self, id: &PluginId) {
        tracing::trace!(plugin_id = %id, "mock initialize");
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(id.clone());
        }
    }

    /// Recorded ids as strings, in call order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|guard| guard.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Succeeds and records the call.
#[derive(Debug, Clone)]
pub struct RecordingModule {
    log: InitLog,
}

impl RecordingModule {
    /// Create a module recording into `log`.
    #[must_use]
    pub fn new(log: InitLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl PluginModule for RecordingModule {
    async fn initialize(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()> {
        self.log.record(ctx.plugin_id());
        Ok(())
    }
}

/// Records the call, then fails with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingModule {
    log: InitLog,
    message: String,
}

impl FailingModule {
    /// Create a module recording into `log` and failing with `message`.
    #[must_use]
    pub fn new(log: InitLog, message: impl Into<String>) -> Self {
        Self {
            log,
            message: message.into(),
        }
    }
}

#[async_trait]
impl PluginModule for FailingModule {
    async fn initialize(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()> {
        self.log.record(ctx.plugin_id());
        Err(PluginError::ExecutionFailed(self.message.clone()))
    }
}

/// Records the call, then sleeps before succeeding.
#[derive(Debug, Clone)]
pub struct SlowModule {
    log: InitLog,
    delay: Duration,
}

impl SlowModule {
    /// Create a module recording into `log` and sleeping for `delay`.
    #[must_use]
    pub fn new(log: InitLog, delay: Duration) -> Self {
        Self { log, delay }
    }
}

#[async_trait]
impl PluginModule for SlowModule {
    async fn initialize(&mut self, ctx: &PluginContext<'_>) -> PluginResult<()> {
        self.log.record(ctx.plugin_id());
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Binds a string service under a fixed key.
#[derive(Debug, Clone)]
pub struct StringBindings {
    key: String,
    value: String,
}

impl StringBindings {
    /// Create a binding module for `key = value`.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ContainerModule for StringBindings {
    fn load(&self, registry: &mut ServiceRegistry) -> PluginResult<()> {
        registry.bind(self.key.clone(), self.value.clone())
    }
}

/// A module table with one [`RecordingModule`] export per name.
#[must_use]
pub fn recording_table<'a>(
    log: &InitLog,
    exports: impl IntoIterator<Item = &'a str>,
) -> ModuleTable {
    exports.into_iter().fold(ModuleTable::new(), |table, name| {
        let log = log.clone();
        table.with_plugin(name, move |_: &ServiceRegistry| {
            Ok(Box::new(RecordingModule::new(log.clone())) as Box<dyn PluginModule>)
        })
    })
}

/// Add a [`FailingModule`] export to `table`.
#[must_use]
pub fn with_failing(
    table: ModuleTable,
    log: &InitLog,
    export: &str,
    message: &str,
) -> ModuleTable {
    let log = log.clone();
    let message = message.to_string();
    table.with_plugin(export, move |_: &ServiceRegistry| {
        Ok(Box::new(FailingModule::new(log.clone(), message.clone())) as Box<dyn PluginModule>)
    })
}

/// Add a [`SlowModule`] export to `table`.
#[must_use]
pub fn with_slow(table: ModuleTable, log: &InitLog, export: &str, delay: Duration) -> ModuleTable {
    let log = log.clone();
    table.with_plugin(export, move |_: &ServiceRegistry| {
        Ok(Box::new(SlowModule::new(log.clone(), delay)) as Box<dyn PluginModule>)
    })
}

/// Add an export whose factory requires the string service `key`.
///
/// Construction fails with [`PluginError::ServiceNotFound`] when the service
/// is not bound, which makes binding order observable.
#[must_use]
pub fn with_service_reader(
    table: ModuleTable,
    log: &InitLog,
    export: &str,
    key: &str,
) -> ModuleTable {
    let log = log.clone();
    let key = key.to_string();
    table.with_plugin(export, move |registry: &ServiceRegistry| {
        let _service = registry.get::<String>(&key)?;
        Ok(Box::new(RecordingModule::new(log.clone())) as Box<dyn PluginModule>)
    })
}
