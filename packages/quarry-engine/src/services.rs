use crate::error::{EngineError, Result};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for the type-indexed service registry. Registered once per
/// session, read-only afterwards.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared service instance, replacing any previous instance of
    /// the same type.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services.insert(TypeId::of::<T>(), service);
        self
    }

    pub fn into_context(self) -> ExecutionContext {
        ExecutionContext {
            services: Arc::new(self.services),
        }
    }
}

/// Opaque read-only capability lookup handed to calculators and units of
/// work.
#[derive(Clone)]
pub struct ExecutionContext {
    services: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ExecutionContext {
    /// Context with no registered services.
    pub fn empty() -> Self {
        ServiceRegistry::new().into_context()
    }

    /// Look up a service by type. Fails if the type was never registered;
    /// this is a configuration error and is not retried.
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| Arc::clone(service).downcast::<T>().ok())
            .ok_or(EngineError::ServiceNotRegistered(type_name::<T>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ChecksumService {
        algorithm: &'static str,
    }

    #[test]
    fn test_registered_service_is_returned() {
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(ChecksumService { algorithm: "sha256" }));
        let context = registry.into_context();

        let service = context.get::<ChecksumService>().unwrap();
        assert_eq!(service.algorithm, "sha256");
    }

    #[test]
    fn test_unregistered_service_is_a_configuration_error() {
        let context = ExecutionContext::empty();

        let result = context.get::<ChecksumService>();
        assert!(matches!(
            result,
            Err(EngineError::ServiceNotRegistered(_))
        ));
    }

    #[test]
    fn test_later_registration_replaces_earlier() {
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(ChecksumService { algorithm: "md5" }));
        registry.register(Arc::new(ChecksumService { algorithm: "sha256" }));
        let context = registry.into_context();

        assert_eq!(context.get::<ChecksumService>().unwrap().algorithm, "sha256");
    }
}
