//! Live-subscription handles and callback registries.
//!
//! Every live source in the crate (session changes, collection snapshots)
//! hands out a [`Subscription`]. The handle releases its source exactly once,
//! either through [`Subscription::unsubscribe`] or when it is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Callback invoked with every value a live source publishes.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

type Cancel = Box<dyn FnOnce() + Send>;

/// An active registration with a live source.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Cancel>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct Registry<T> {
    next_id: u64,
    callbacks: HashMap<u64, Callback<T>>,
}

/// A set of callbacks that all receive every emitted value.
pub struct Listeners<T> {
    inner: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                callbacks: HashMap::new(),
            })),
        }
    }
}

impl<T: Clone + Send + 'static> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. It stays registered until the returned handle is released.
    pub fn add(&self, callback: Callback<T>) -> Subscription {
        let id = {
            let mut registry = lock(&self.inner);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.insert(id, callback);
            id
        };

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).callbacks.remove(&id);
            }
        })
    }

    /// Calls every registered callback with a clone of `value`.
    ///
    /// Callbacks run outside the registry lock, so a callback may add or
    /// release subscriptions.
    pub fn emit(&self, value: T) {
        let callbacks: Vec<Callback<T>> = lock(&self.inner).callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(value.clone());
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A panicking callback must not wedge every later emit.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Callback<u32>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        (count, Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn emit_reaches_every_listener() {
        let listeners = Listeners::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        let _sub_a = listeners.add(cb_a);
        let _sub_b = listeners.add(cb_b);

        listeners.emit(7);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let listeners = Listeners::new();
        let (count, cb) = counter();
        let sub = listeners.add(cb);

        listeners.emit(1);
        sub.unsubscribe();
        listeners.emit(2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn drop_releases_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&released);
        {
            let _sub = Subscription::new(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let seen = Arc::clone(&released);
        let sub = Subscription::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handle_outliving_registry_is_harmless() {
        let listeners = Listeners::<u32>::new();
        let (_count, cb) = counter();
        let sub = listeners.add(cb);
        drop(listeners);
        sub.unsubscribe();
    }
}
