//! Queue registry for discovering schedulers by name.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

use crate::handle::JobQueue;

/// Registry of named [`JobQueue`] handles.
///
/// This provides a way to look up schedulers by name without passing
/// handles through the entire call stack. Handles of any job and result type
/// can be registered; lookups name the types they expect.
pub struct QueueRegistry {
    queues: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl QueueRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Register a queue, replacing any queue registered under the same name.
    pub fn register<T, R>(&self, name: &str, queue: JobQueue<T, R>)
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        self.queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Box::new(queue));
    }

    /// Unregister a queue. Returns whether one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    /// Get a queue by name.
    ///
    /// Returns `None` if no queue is registered under `name` or it was
    /// registered with different job or result types.
    pub fn get<T, R>(&self, name: &str) -> Option<JobQueue<T, R>>
    where
        T: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .and_then(|queue| queue.downcast_ref::<JobQueue<T, R>>())
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// List all registered queue names.
    pub fn list(&self) -> Vec<String> {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global registry instance.
static REGISTRY: LazyLock<QueueRegistry> = LazyLock::new(QueueRegistry::new);

/// Get the global queue registry.
pub fn global_registry() -> &'static QueueRegistry {
    &REGISTRY
}
