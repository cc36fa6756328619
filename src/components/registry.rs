//! Per-link component cache.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::components::{Component, ComponentContext, TARGET};

struct Entry {
    type_id: TypeId,
    any: Arc<dyn Any + Send + Sync>,
    component: Arc<dyn Component>,
}

/// Creates components on first use and keeps one instance per type.
pub struct Registry {
    ctx: ComponentContext,
    ready: Arc<AtomicBool>,
    entries: Mutex<Vec<Entry>>,
}

impl Registry {
    /// `ready` is shared with the link and tells newly created components
    /// whether to initialise straight away.
    pub fn new(ctx: ComponentContext, ready: Arc<AtomicBool>) -> Self {
        Self { ctx, ready, entries: Mutex::new(Vec::new()) }
    }

    /// The cached `T`, creating it on first access.
    ///
    /// `T::create` runs under the registry lock and must not call back into
    /// the registry.
    pub fn get<T: Component>(&self) -> Arc<T> {
        let created = {
            let mut entries = self.entries.lock();
            if let Some(existing) = entries
                .iter()
                .filter(|e| e.type_id == TypeId::of::<T>())
                .find_map(|e| Arc::clone(&e.any).downcast::<T>().ok())
            {
                return existing;
            }
            let component = Arc::new(T::create(self.ctx.clone()));
            entries.push(Entry {
                type_id: TypeId::of::<T>(),
                any: component.clone(),
                component: component.clone(),
            });
            component
        };
        debug!(target: TARGET, component = created.name(), "created");
        if self.ready.load(Ordering::Acquire) {
            initialize(created.as_ref());
        }
        created
    }

    /// Whether a `T` has been created.
    pub fn contains<T: Component>(&self) -> bool {
        self.entries.lock().iter().any(|e| e.type_id == TypeId::of::<T>())
    }

    /// Every cached component, in creation order.
    pub fn all(&self) -> Vec<Arc<dyn Component>> {
        self.entries.lock().iter().map(|e| Arc::clone(&e.component)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every cached component's initializer. A failing component is
    /// logged and does not stop the rest.
    pub fn initialize_all(&self) {
        for component in self.all() {
            initialize(component.as_ref());
        }
    }

    /// Dispose every cached component and empty the cache.
    pub fn dispose(&self) {
        let entries = std::mem::take(&mut *self.entries.lock());
        for entry in entries {
            debug!(target: TARGET, component = entry.component.name(), "disposing");
            entry.component.dispose();
        }
    }
}

fn initialize(component: &dyn Component) {
    if let Err(e) = component.initialize() {
        warn!(target: TARGET, component = component.name(), error = %e, "initialize failed");
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.entries.lock().iter().map(|e| e.component.name()).collect();
        f.debug_struct("Registry")
            .field("ready", &self.ready.load(Ordering::Acquire))
            .field("components", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::context;
    use crate::components::{Mute, Tasks, Volume};
    use crate::conn::Transport;

    #[test]
    fn one_instance_per_type() {
        let (_wire, ctx) = context();
        let registry = Registry::new(ctx, Arc::new(AtomicBool::new(false)));
        let a = registry.get::<Volume>();
        let b = registry.get::<Volume>();
        assert!(Arc::ptr_eq(&a, &b));
        registry.get::<Mute>();
        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry.all().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["volume", "mute"]);
    }

    #[test]
    fn created_while_ready_initializes_immediately() {
        let (wire, ctx) = context();
        let ready = Arc::new(AtomicBool::new(false));
        let registry = Registry::new(ctx, ready.clone());

        registry.get::<Volume>();
        assert!(wire.take().is_empty());

        ready.store(true, Ordering::Release);
        registry.get::<Tasks>();
        assert_eq!(wire.take(), ["vm tasks -l", "vm tasks -f"]);

        registry.initialize_all();
        assert_eq!(wire.take(), ["vm volume -g", "vm volume -w", "vm tasks -l", "vm tasks -f"]);
    }

    #[test]
    fn dispose_clears_cache_and_subscriptions() {
        let (_wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let registry = Registry::new(ctx, Arc::new(AtomicBool::new(false)));
        let first = registry.get::<Tasks>();
        assert_eq!(dispatcher.len(), 4);

        registry.dispose();
        assert!(registry.is_empty());
        assert!(dispatcher.is_empty());
        assert!(!registry.contains::<Tasks>());

        let second = registry.get::<Tasks>();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_initialize_does_not_stop_others() {
        let (wire, ctx) = context();
        let registry = Registry::new(ctx, Arc::new(AtomicBool::new(false)));
        registry.get::<Volume>();
        registry.get::<Mute>();
        wire.disconnect().unwrap();
        // Both fail with NotConnected; neither panics.
        registry.initialize_all();
        assert!(wire.take().is_empty());
    }
}
