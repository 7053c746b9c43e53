use crate::cache::CalculatedValueCache;
use crate::calculated::{CalculatedValue, SupplierBackedCalculator, ValueCalculator};
use crate::error::Result;
use crate::lease::ProjectLeaseRegistry;
use crate::services::ExecutionContext;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// Constructs calculated values and keyed caches, wiring every container to
/// the same lease registry and execution context. One factory per session.
#[derive(Clone)]
pub struct CalculatedValueFactory {
    leases: Arc<ProjectLeaseRegistry>,
    context: ExecutionContext,
}

impl CalculatedValueFactory {
    pub fn new(leases: Arc<ProjectLeaseRegistry>, context: ExecutionContext) -> Self {
        Self { leases, context }
    }

    /// A calculated value that may have dependencies or need access to
    /// mutable project state.
    pub fn create<T, C>(
        &self,
        display_name: impl Into<String>,
        calculator: C,
    ) -> Arc<CalculatedValue<T>>
    where
        T: Clone + Send + Sync + 'static,
        C: ValueCalculator<T> + 'static,
    {
        Arc::new(CalculatedValue::new(
            display_name,
            calculator,
            Arc::clone(&self.leases),
            self.context.clone(),
        ))
    }

    /// A calculated value backed by a no-dependency supplier.
    pub fn create_supplied<T, F>(
        &self,
        display_name: impl Into<String>,
        supplier: F,
    ) -> Arc<CalculatedValue<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + 'static,
    {
        self.create(display_name, SupplierBackedCalculator::new(supplier))
    }

    /// A calculated value already in the `Success` state.
    pub fn create_eager<T>(&self, display_name: impl Into<String>, value: T) -> Arc<CalculatedValue<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        Arc::new(CalculatedValue::new_eager(display_name, value))
    }

    /// A keyed cache whose containers are all produced by this factory.
    pub fn create_cache<K, V>(&self, display_name: impl Into<String>) -> CalculatedValueCache<K, V>
    where
        K: Eq + Hash + Clone + Display + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        CalculatedValueCache::new(display_name, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculated::ProjectStateCalculator;

    fn factory() -> CalculatedValueFactory {
        CalculatedValueFactory::new(
            Arc::new(ProjectLeaseRegistry::new()),
            ExecutionContext::empty(),
        )
    }

    #[test]
    fn test_supplied_value_ignores_context() {
        let factory = factory();
        let value = factory.create_supplied("fixed", || Ok(41 + 1));

        value.finalize_if_not_already().unwrap();
        assert_eq!(value.get().unwrap(), 42);
    }

    #[test]
    fn test_eager_value_is_terminal_at_birth() {
        let factory = factory();
        let value = factory.create_eager("constant", "prebuilt".to_string());

        assert!(value.is_finalized());
        assert_eq!(value.get().unwrap(), "prebuilt");
    }

    #[test]
    fn test_created_containers_share_the_lease_registry() {
        let leases = Arc::new(ProjectLeaseRegistry::new());
        let factory = CalculatedValueFactory::new(Arc::clone(&leases), ExecutionContext::empty());

        let leases_probe = Arc::clone(&leases);
        let value = factory.create(
            "model view",
            ProjectStateCalculator::new(move |_ctx: &ExecutionContext| {
                Ok(leases_probe.is_held_by_current_thread())
            }),
        );

        value.finalize_if_not_already().unwrap();
        assert!(value.get().unwrap());
    }
}
