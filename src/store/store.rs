use super::{Atom, Subscription};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn() -> Result<()> + Send + Sync>;

struct Slot {
    value: Box<dyn Any + Send + Sync>,
    version: u64,
    // the first `mirrors` listeners run before any other
    listeners: Vec<(usize, Listener)>,
    mirrors: usize,
    disposed: bool,
}

#[derive(Default)]
struct StoreInner {
    slots: HashMap<usize, Slot>,
    next_listener: usize,
}

impl StoreInner {
    /// Fetch the slot for an atom, materialising it from the atom's initial
    /// value on first access.
    fn slot<T>(&mut self, atom: &Atom<T>) -> Result<&mut Slot>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slot = self.slots.entry(atom.id()).or_insert_with(|| Slot {
            value: Box::new(atom.initial().clone()),
            version: 0,
            listeners: Vec::new(),
            mirrors: 0,
            disposed: false,
        });
        if slot.disposed {
            return Err(Error::Disposed {
                label: atom.label(),
            });
        }
        Ok(slot)
    }
}

/// A container holding the values of any number of [`Atom`]s.
///
/// Reads and writes go through the store; each write synchronously notifies
/// the atom's listeners. The store lock is released before listeners run, so
/// a listener may freely read or write atoms of the same store.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the atom's current value.
    pub fn get<T>(&self, atom: &Atom<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let slot = inner.slot(atom)?;
        slot.value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| Error::TypeMismatch {
                label: atom.label(),
            })
    }

    /// Set a new value and notify every listener of the atom.
    ///
    /// Listeners run on every write, even when the value did not change. A
    /// failing listener does not stop the others; the first error is
    /// returned once all have run.
    pub fn set<T>(&self, atom: &Atom<T>, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let listeners = {
            let mut inner = self.inner.lock();
            let slot = inner.slot(atom)?;
            slot.value = Box::new(value);
            slot.version += 1;
            slot.listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect::<Vec<_>>()
        };

        let mut outcome = Ok(());
        for listener in listeners {
            if let Err(err) = listener() {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }

    /// Update the value in place using a function.
    pub fn update<T, F>(&self, atom: &Atom<T>, f: F) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&mut T),
    {
        let mut value = self.get(atom)?;
        f(&mut value);
        self.set(atom, value)
    }

    /// Subscribe to writes of an atom.
    ///
    /// The listener is called after every write; read the new value through
    /// [`get`](Self::get).
    pub fn sub<T, F>(&self, atom: &Atom<T>, listener: F) -> Result<Subscription>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(atom, Arc::new(listener), false)
    }

    /// Subscribe a listener that runs ahead of every ordinary listener,
    /// including ones registered earlier.
    pub(crate) fn sub_mirror<T, F>(&self, atom: &Atom<T>, listener: F) -> Result<Subscription>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(atom, Arc::new(listener), true)
    }

    fn subscribe<T>(&self, atom: &Atom<T>, listener: Listener, mirror: bool) -> Result<Subscription>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let listener_id = inner.next_listener;
        inner.next_listener += 1;
        let slot = inner.slot(atom)?;
        if mirror {
            slot.listeners.insert(slot.mirrors, (listener_id, listener));
            slot.mirrors += 1;
        } else {
            slot.listeners.push((listener_id, listener));
        }

        let store = Arc::downgrade(&self.inner);
        let atom_id = atom.id();
        Ok(Subscription::new(move || {
            if let Some(store) = store.upgrade() {
                let mut inner = store.lock();
                if let Some(slot) = inner.slots.get_mut(&atom_id) {
                    if let Some(index) = slot.listeners.iter().position(|(id, _)| *id == listener_id) {
                        slot.listeners.remove(index);
                        if index < slot.mirrors {
                            slot.mirrors -= 1;
                        }
                    }
                }
            }
        }))
    }

    /// Number of writes the atom has received in this store.
    pub fn version<T>(&self, atom: &Atom<T>) -> u64 {
        self.inner
            .lock()
            .slots
            .get(&atom.id())
            .map_or(0, |slot| slot.version)
    }

    /// Dispose of an atom. Later reads, writes and subscriptions fail.
    pub fn dispose<T>(&self, atom: &Atom<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        if let Ok(slot) = inner.slot(atom) {
            slot.disposed = true;
            slot.listeners.clear();
            slot.mirrors = 0;
        }
    }

    pub fn is_disposed<T>(&self, atom: &Atom<T>) -> bool {
        self.inner
            .lock()
            .slots
            .get(&atom.id())
            .is_some_and(|slot| slot.disposed)
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A non-owning reference to a [`Store`].
#[derive(Clone)]
pub(crate) struct WeakStore {
    inner: Weak<Mutex<StoreInner>>,
}

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct AppState {
        count: usize,
        name: String,
    }

    #[test]
    fn store_get_set() {
        let store = Store::new();
        let atom = Atom::new(AppState {
            count: 0,
            name: "test".to_string(),
        });

        assert_eq!(store.get(&atom).unwrap().count, 0);

        store
            .set(
                &atom,
                AppState {
                    count: 42,
                    name: "updated".to_string(),
                },
            )
            .unwrap();

        let state = store.get(&atom).unwrap();
        assert_eq!(state.count, 42);
        assert_eq!(state.name, "updated");
    }

    #[test]
    fn stores_hold_independent_values() {
        let first = Store::new();
        let second = Store::new();
        let atom = Atom::new(1);

        first.set(&atom, 2).unwrap();
        assert_eq!(first.get(&atom).unwrap(), 2);
        assert_eq!(second.get(&atom).unwrap(), 1);
    }

    #[test]
    fn store_update() {
        let store = Store::new();
        let atom = Atom::new(AppState {
            count: 0,
            name: "test".to_string(),
        });

        store.update(&atom, |state| state.count += 10).unwrap();

        assert_eq!(store.get(&atom).unwrap().count, 10);
        assert_eq!(store.version(&atom), 1);
    }

    #[test]
    fn store_subscribe() {
        let store = Store::new();
        let atom = Atom::new(0);

        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let _sub = store
            .sub(&atom, move || {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        store.update(&atom, |n| *n += 1).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        // Equal values still notify.
        store.set(&atom, 1).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = Store::new();
        let atom = Atom::new(0);
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        let sub = store
            .sub(&atom, move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        store.set(&atom, 1).unwrap();
        drop(sub);
        store.set(&atom, 2).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_write_reentrantly() {
        let store = Store::new();
        let source = Atom::new(0);
        let mirror = Atom::new(0);

        let store_clone = store.clone();
        let (source_clone, mirror_clone) = (source.clone(), mirror.clone());
        store
            .sub(&source, move || {
                let value = store_clone.get(&source_clone)?;
                store_clone.set(&mirror_clone, value * 2)
            })
            .unwrap()
            .detach();

        store.set(&source, 21).unwrap();
        assert_eq!(store.get(&mirror).unwrap(), 42);
    }

    #[test]
    fn listener_error_reaches_writer() {
        let store = Store::new();
        let atom = Atom::with_label(0, "failing");

        store
            .sub(&atom, || {
                Err(Error::Disposed {
                    label: "downstream".to_string(),
                })
            })
            .unwrap()
            .detach();

        let later = Arc::new(AtomicUsize::new(0));
        let later_clone = later.clone();
        store
            .sub(&atom, move || {
                later_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
            .detach();

        let err = store.set(&atom, 1).unwrap_err();
        assert!(matches!(err, Error::Disposed { label } if label == "downstream"));
        // The write itself was committed.
        assert_eq!(store.get(&atom).unwrap(), 1);
        assert_eq!(later.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mirror_listeners_run_before_earlier_subscribers() {
        let store = Store::new();
        let atom = Atom::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        let early = order.clone();
        let _early = store
            .sub(&atom, move || {
                early.lock().push("early");
                Ok(())
            })
            .unwrap();
        let mirror = order.clone();
        let mirror_guard = store
            .sub_mirror(&atom, move || {
                mirror.lock().push("mirror");
                Ok(())
            })
            .unwrap();
        let late = order.clone();
        let _late = store
            .sub(&atom, move || {
                late.lock().push("late");
                Ok(())
            })
            .unwrap();

        store.set(&atom, 1).unwrap();
        assert_eq!(*order.lock(), vec!["mirror", "early", "late"]);

        drop(mirror_guard);
        order.lock().clear();
        store.set(&atom, 2).unwrap();
        assert_eq!(*order.lock(), vec!["early", "late"]);
    }

    #[test]
    fn disposed_atom_rejects_access() {
        let store = Store::new();
        let atom = Atom::with_label(0, "gone");
        store.dispose(&atom);

        assert!(store.is_disposed(&atom));
        assert!(matches!(store.get(&atom), Err(Error::Disposed { .. })));
        assert!(matches!(store.set(&atom, 1), Err(Error::Disposed { .. })));
        assert!(store.sub(&atom, || Ok(())).is_err());
    }
}
