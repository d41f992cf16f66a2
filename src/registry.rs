//! Instance Registry Module
//!
//! Tracks live cache instances for bulk clearing and introspection without
//! depending on their value types. Registries are constructed and passed
//! explicitly; there is no process-wide instance.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::info;

use crate::cache::Memcache;

// == Cache Instance ==
/// The slice of the cache contract the registry needs.
pub trait CacheInstance: Send + Sync {
    /// Current number of entries
    fn size(&self) -> usize;
    /// Maximum number of entries
    fn cap(&self) -> usize;
    /// Drop every entry
    fn clear(&self);
}

impl<V: Send> CacheInstance for Memcache<V> {
    fn size(&self) -> usize {
        Memcache::size(self)
    }

    fn cap(&self) -> usize {
        Memcache::cap(self)
    }

    fn clear(&self) {
        Memcache::clear(self)
    }
}

// == Registry ==
/// Weakly held set of cache instances. Dropped caches disappear on their own.
#[derive(Default)]
pub struct Registry {
    instances: RwLock<Vec<Weak<dyn CacheInstance>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `instance`.
    pub fn register<C: CacheInstance + 'static>(&self, instance: &Arc<C>) {
        let instance: Arc<dyn CacheInstance> = instance.clone();
        self.instances.write().push(Arc::downgrade(&instance));
    }

    /// Clears every live instance. Returns how many were cleared.
    pub fn clear_all(&self) -> usize {
        let live = self.live_instances();
        for instance in &live {
            instance.clear();
        }
        info!(instances = live.len(), "registry cleared all caches");
        live.len()
    }

    /// Number of registered instances still alive.
    pub fn lives(&self) -> usize {
        self.live_instances().len()
    }

    /// Sum of the sizes of all live instances.
    pub fn total_size(&self) -> usize {
        self.live_instances().iter().map(|c| c.size()).sum()
    }

    /// Sum of the capacities of all live instances.
    pub fn total_cap(&self) -> usize {
        self.live_instances().iter().map(|c| c.cap()).sum()
    }

    /// Upgrades every live instance, pruning the dead ones.
    fn live_instances(&self) -> Vec<Arc<dyn CacheInstance>> {
        let mut instances = self.instances.write();
        let mut live = Vec::with_capacity(instances.len());
        instances.retain(|weak| match weak.upgrade() {
            Some(instance) => {
                live.push(instance);
                true
            }
            None => false,
        });
        live
    }
}
