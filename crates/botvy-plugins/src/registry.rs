//! The explicit service registry plugins are wired through.
//!
//! The host owns one [`ServiceRegistry`]. During loading the instantiator gets
//! it by `&mut` to apply binding modules and register plugin factories. Once
//! loading is done plugins only ever see it by `&`. Bindings are additive: a
//! key, once bound, keeps its value.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{PluginError, PluginResult};
use crate::plugin::{PluginId, PluginModule};

/// Well-known registry keys.
pub mod services {
    /// The [`InitializationSide`](crate::InitializationSide) the host runs as.
    pub const INITIALIZATION_SIDE: &str = "System.Plugin.InitializationSide";
    /// The host's working directory, as a `PathBuf`.
    pub const CURRENT_WORKING_DIRECTORY: &str = "System.CurrentWorkingDirectory";
}

/// Builds a plugin's module, pulling whatever it needs out of the registry.
pub type PluginFactory =
    Arc<dyn Fn(&ServiceRegistry) -> PluginResult<Box<dyn PluginModule>> + Send + Sync>;

type Service = Arc<dyn Any + Send + Sync>;

/// Keyed services plus the plugin factories registered by id.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Service>,
    factories: HashMap<PluginId, PluginFactory>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<&String> = self.services.keys().collect();
        services.sort();
        let mut factories: Vec<&PluginId> = self.factories.keys().collect();
        factories.sort();
        f.debug_struct("ServiceRegistry")
            .field("services", &services)
            .field("factories", &factories)
            .finish()
    }
}

impl ServiceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyBound`] if `key` is taken. The existing
    /// binding is left alone.
    pub fn bind<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> PluginResult<()> {
        self.bind_arc(key, Arc::new(value))
    }

    /// Bind an already shared value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyBound`] if `key` is taken.
    pub fn bind_arc<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: Arc<T>,
    ) -> PluginResult<()> {
        let key = key.into();
        if self.services.contains_key(&key) {
            return Err(PluginError::AlreadyBound(key));
        }
        trace!(key = %key, ty = type_name::<T>(), "Bound service");
        self.services.insert(key, value);
        Ok(())
    }

    /// Fetch the service bound under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ServiceNotFound`] if nothing is bound, or
    /// [`PluginError::ServiceTypeMismatch`] if the binding has another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> PluginResult<Arc<T>> {
        let service = self
            .services
            .get(key)
            .ok_or_else(|| PluginError::ServiceNotFound(key.to_string()))?;
        Arc::clone(service)
            .downcast::<T>()
            .map_err(|_| PluginError::ServiceTypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Whether `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.services.contains_key(key)
    }

    /// Register the factory for a plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyBound`] if a factory is already
    /// registered for `id`.
    pub fn register_plugin(&mut self, id: PluginId, factory: PluginFactory) -> PluginResult<()> {
        if self.factories.contains_key(&id) {
            return Err(PluginError::AlreadyBound(id.to_string()));
        }
        trace!(plugin_id = %id, "Registered plugin factory");
        self.factories.insert(id, factory);
        Ok(())
    }

    /// Whether a factory is registered for `id`.
    #[must_use]
    pub fn has_plugin(&self, id: &PluginId) -> bool {
        self.factories.contains_key(id)
    }

    /// Build a plugin module through its registered factory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] if no factory is registered, or
    /// whatever the factory reports.
    pub fn instantiate(&self, id: &PluginId) -> PluginResult<Box<dyn PluginModule>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| PluginError::NotFound(id.clone()))?;
        factory(self)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;

    use super::*;
    use crate::context::PluginContext;

    struct Greeter {
        greeting: Arc<String>,
    }

    #[async_trait]
    impl PluginModule for Greeter {
        async fn initialize(&mut self, _ctx: &PluginContext<'_>) -> PluginResult<()> {
            if self.greeting.is_empty() {
                return Err(PluginError::ExecutionFailed("empty greeting".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn bind_and_get_round_trip() {
        let mut registry = ServiceRegistry::new();
        registry
            .bind(services::CURRENT_WORKING_DIRECTORY, PathBuf::from("/work"))
            .unwrap();

        let cwd: Arc<PathBuf> = registry.get(services::CURRENT_WORKING_DIRECTORY).unwrap();
        assert_eq!(*cwd, PathBuf::from("/work"));
        assert!(registry.contains(services::CURRENT_WORKING_DIRECTORY));
    }

    #[test]
    fn rebinding_keeps_the_original() {
        let mut registry = ServiceRegistry::new();
        registry.bind("greeting", "hello".to_string()).unwrap();
        let err = registry.bind("greeting", "bye".to_string()).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyBound(k) if k == "greeting"));

        let value: Arc<String> = registry.get("greeting").unwrap();
        assert_eq!(value.as_str(), "hello");
    }

    #[test]
    fn get_reports_missing_and_mistyped() {
        let mut registry = ServiceRegistry::new();
        registry.bind("count", 3_u32).unwrap();

        assert!(matches!(
            registry.get::<u32>("nope"),
            Err(PluginError::ServiceNotFound(_))
        ));
        assert!(matches!(
            registry.get::<String>("count"),
            Err(PluginError::ServiceTypeMismatch { .. })
        ));
    }

    #[test]
    fn factory_sees_bound_services() {
        let mut registry = ServiceRegistry::new();
        registry.bind("greeting", "hi".to_string()).unwrap();

        let id = PluginId::from_static("com.test.greeter");
        let factory: PluginFactory = Arc::new(|registry: &ServiceRegistry| {
            let greeting = registry.get::<String>("greeting")?;
            Ok(Box::new(Greeter { greeting }) as Box<dyn PluginModule>)
        });
        registry.register_plugin(id.clone(), factory.clone()).unwrap();
        assert!(registry.has_plugin(&id));
        assert!(registry.instantiate(&id).is_ok());

        assert!(matches!(
            registry.register_plugin(id.clone(), factory),
            Err(PluginError::AlreadyBound(_))
        ));
        assert!(matches!(
            registry.instantiate(&PluginId::from_static("com.test.unknown")),
            Err(PluginError::NotFound(_))
        ));
    }
}
