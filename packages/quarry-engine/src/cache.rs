use crate::calculated::CalculatedValue;
use crate::error::Result;
use crate::factory::CalculatedValueFactory;
use dashmap::DashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

/// A mapping from key to calculated value guaranteeing one live container per
/// key and at most one computation per key between clears.
///
/// Container creation uses the concurrent map's entry API, so the map's
/// structural lock is held only while the container object is constructed;
/// the computation itself always runs outside it.
pub struct CalculatedValueCache<K, V> {
    display_name: String,
    entries: DashMap<K, Arc<CalculatedValue<V>>>,
    factory: CalculatedValueFactory,
}

impl<K, V> CalculatedValueCache<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(display_name: impl Into<String>, factory: CalculatedValueFactory) -> Self {
        Self {
            display_name: display_name.into(),
            entries: DashMap::new(),
            factory,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Compute (or replay) the value for `key`. Concurrent calls for the same
    /// key race only for container creation; exactly one of them wins, and
    /// `compute` runs at most once per key between clears. Everyone gets the
    /// winner's outcome, including a captured failure.
    pub fn compute_if_absent<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: Fn(&K) -> Result<V> + Send + 'static,
    {
        let value = {
            let entry = self.entries.entry(key.clone()).or_insert_with(|| {
                let display_name = format!("{} ({})", key, self.display_name);
                let key = key.clone();
                self.factory
                    .create_supplied(display_name, move || compute(&key))
            });
            Arc::clone(entry.value())
        };
        // Finalized after the map shard lock is released, so arbitrary user
        // computation never holds the cache's structural lock.
        value.finalize_if_not_already()?;
        value.get()
    }

    /// Drop all entries. In-flight computations past container creation run
    /// to completion on their superseded containers; a later call for the
    /// same key builds a brand-new container.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
