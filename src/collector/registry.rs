//! Collector registry.
//!
//! An explicit, append-only registry constructed at startup and handed by
//! reference into the orchestrator. Registration happens strictly before a
//! cycle starts; there is no removal operation.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use super::cluster::ClusterCollector;
use super::extension::ExtensionCollector;
use super::platform::PlatformCollector;
use super::traits::Collector;

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two collectors declared the same record key.
    ///
    /// Allowing this would silently drop one collector's data, so it is a
    /// startup validation failure instead.
    #[error("duplicate record key '{0}'")]
    DuplicateKey(&'static str),
}

/// Registry of the collectors that make up one snapshot.
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: Vec<Arc<dyn Collector>>,
    keys: HashSet<&'static str>,
}

impl CollectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in collectors.
    ///
    /// Infallible: the built-in record keys are distinct by construction.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for collector in [
            Arc::new(ClusterCollector) as Arc<dyn Collector>,
            Arc::new(ExtensionCollector),
            Arc::new(PlatformCollector),
        ] {
            // Built-in keys are unique; a panic here is a programming error.
            if let Err(e) = registry.register(collector) {
                unreachable!("built-in collector keys collide: {e}");
            }
        }
        registry
    }

    /// Register a collector.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateKey`] if another collector already
    /// claimed the same record key.
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> Result<(), RegistryError> {
        let key = collector.record_key();
        if !self.keys.insert(key) {
            return Err(RegistryError::DuplicateKey(key));
        }
        tracing::debug!(record_key = key, "Collector registered");
        self.collectors.push(collector);
        Ok(())
    }

    /// Iterate the registered collectors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Collector>> {
        self.collectors.iter()
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("record_keys", &self.keys)
            .finish_non_exhaustive()
    }
}
