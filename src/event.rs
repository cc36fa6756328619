//! Observer lists for component state and notifications.
//!
//! Listener lists are cloned before emitting, so listeners may add or
//! remove listeners (themselves included) while an emit is in progress.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Handle returned by [`Event::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<T>)>,
}

/// A multicast notification carrying `T`.
pub struct Event<T> {
    listeners: Mutex<Listeners<T>>,
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self { listeners: Mutex::new(Listeners { next_id: 0, entries: Vec::new() }) }
    }

    /// Add a listener. Listeners run in subscription order.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let mut l = self.listeners.lock();
        l.next_id += 1;
        let id = ListenerId(l.next_id);
        l.entries.push((id, Arc::new(f)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut l = self.listeners.lock();
        let before = l.entries.len();
        l.entries.retain(|(lid, _)| *lid != id);
        l.entries.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    /// Call every listener with `value`, in subscription order.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> =
            self.listeners.lock().entries.iter().map(|(_, f)| Arc::clone(f)).collect();
        for f in snapshot {
            f(value);
        }
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.listeners.lock().entries.clear();
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("listeners", &self.listener_count()).finish()
    }
}

/// A cached value with a change notification.
///
/// `changed` fires only when [`set`](Self::set) stores a value different
/// from the current one. The value is stale until the first `set`.
pub struct Property<T> {
    state: Mutex<(T, bool)>,
    changed: Event<T>,
}

impl<T: Clone + PartialEq> Property<T> {
    pub fn new(initial: T) -> Self {
        Self { state: Mutex::new((initial, false)), changed: Event::new() }
    }

    /// A clone of the current value.
    pub fn get(&self) -> T {
        self.state.lock().0.clone()
    }

    /// Borrow the value for the duration of `f`. `f` must not call back
    /// into this property.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.lock().0)
    }

    /// `true` once any value has been stored.
    pub fn is_fresh(&self) -> bool {
        self.state.lock().1
    }

    /// Store `value`; emits `changed` and returns `true` if it differs from
    /// the cached value.
    pub fn set(&self, value: T) -> bool {
        {
            let mut state = self.state.lock();
            state.1 = true;
            if state.0 == value {
                return false;
            }
            state.0 = value.clone();
        }
        self.changed.emit(&value);
        true
    }

    /// Fires with the new value whenever [`set`](Self::set) changes it.
    pub fn changed(&self) -> &Event<T> {
        &self.changed
    }
}

impl<T: Clone + PartialEq + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Property")
            .field("value", &state.0)
            .field("fresh", &state.1)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<T: Clone + Send + 'static>(event: &Event<T>) -> Arc<Mutex<Vec<T>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        event.subscribe(move |v: &T| s.lock().push(v.clone()));
        seen
    }

    #[test]
    fn property_suppresses_noop_sets() {
        let p = Property::new(0u8);
        let seen = collect(p.changed());
        assert!(!p.is_fresh());
        assert!(p.set(42));
        assert!(!p.set(42));
        assert!(p.is_fresh());
        assert_eq!(*seen.lock(), vec![42]);
        assert_eq!(p.get(), 42);
    }

    #[test]
    fn first_set_to_initial_value_is_silent_but_fresh() {
        let p = Property::new(false);
        let seen = collect(p.changed());
        assert!(!p.set(false));
        assert!(p.is_fresh());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn listener_may_read_property() {
        let p = Arc::new(Property::new(1u8));
        let p2 = Arc::clone(&p);
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        p.changed().subscribe(move |_| *s.lock() = Some(p2.get()));
        p.set(7);
        assert_eq!(*seen.lock(), Some(7));
    }

    #[test]
    fn unsubscribe_listener() {
        let e: Event<u32> = Event::new();
        let seen = collect(&e);
        let id = e.subscribe(|_| panic!("removed listener called"));
        assert!(e.unsubscribe(id));
        assert!(!e.unsubscribe(id));
        e.emit(&5);
        assert_eq!(*seen.lock(), vec![5]);
        assert_eq!(e.listener_count(), 1);
    }

    #[test]
    fn listener_can_unsubscribe_itself() {
        let e = Arc::new(Event::<u32>::new());
        let e2 = Arc::clone(&e);
        let id_slot = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&id_slot);
        let id = e.subscribe(move |_| {
            if let Some(id) = *slot.lock() {
                e2.unsubscribe(id);
            }
        });
        *id_slot.lock() = Some(id);
        e.emit(&1);
        assert_eq!(e.listener_count(), 0);
    }
}
