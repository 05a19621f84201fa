use super::{AtomOptions, KeyedAtom};
use crate::effect::{EffectContext, SelfHandle};
use crate::error::{Error, Result};
use crate::runtime::next_id;
use crate::store::Subscription;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::warn;

type SetHandler<T> = Arc<dyn Fn(&T, &T) -> Result<()> + Send + Sync>;
type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Who performed a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Application code going through [`Registry::set`] or [`Registry::reset`].
    External,
    /// The effect with this index, through its own `set_self`/`reset_self`.
    Effect(usize),
}

struct Node<T> {
    default: T,
    value: T,
    version: u64,
    // (owning effect index, handler); the first `mirrors` entries run first
    handlers: Vec<(usize, SetHandler<T>)>,
    mirrors: usize,
    observers: Vec<(usize, Observer<T>)>,
    disposed: bool,
}

#[derive(Default)]
struct RegistryInner {
    nodes: HashMap<usize, Box<dyn Any + Send + Sync>>,
    keys: HashMap<Arc<str>, usize>,
    next_observer: usize,
}

impl RegistryInner {
    fn node_mut<T>(&mut self, atom: &KeyedAtom<T>) -> Result<&mut Node<T>>
    where
        T: Send + Sync + 'static,
    {
        let node = self
            .nodes
            .get_mut(&atom.id())
            .ok_or_else(|| Error::UnknownAtom {
                label: atom.key().to_string(),
            })?
            .downcast_mut::<Node<T>>()
            .ok_or_else(|| Error::TypeMismatch {
                label: atom.key().to_string(),
            })?;
        if node.disposed {
            return Err(Error::Disposed {
                label: atom.key().to_string(),
            });
        }
        Ok(node)
    }
}

/// A registry of keyed atoms with lifecycle effects.
///
/// Each atom is created with a default value and a list of effects. Effects
/// run once when the atom is created and may register `on_set` handlers that
/// observe every later write. Writes made through [`set`](Self::set) and
/// [`reset`](Self::reset) reach every handler; writes an effect makes on its
/// own atom skip that effect's handler.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an atom and run its effects.
    ///
    /// Keys are labels, not identities: a repeated key is logged and yields a
    /// new, independent atom.
    pub fn atom<T>(&self, options: AtomOptions<T>) -> Result<KeyedAtom<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let AtomOptions {
            key,
            default,
            effects,
        } = options;
        let key: Arc<str> = key.into();
        let id = next_id();

        {
            let mut inner = self.inner.lock();
            let seen = inner.keys.entry(Arc::clone(&key)).or_insert(0);
            *seen += 1;
            if *seen > 1 {
                warn!(key = %key, "duplicate atom key, creating an independent atom");
            }
            inner.nodes.insert(
                id,
                Box::new(Node {
                    value: default.clone(),
                    default,
                    version: 0,
                    handlers: Vec::new(),
                    mirrors: 0,
                    observers: Vec::new(),
                    disposed: false,
                }),
            );
        }

        let atom = KeyedAtom::new(id, key);
        for (owner, effect) in effects.into_iter().enumerate() {
            let ctx = EffectContext::new(SelfHandle::new(self.downgrade(), atom.clone(), owner));
            if let Err(err) = effect(&ctx) {
                self.remove(&atom);
                return Err(err);
            }
        }
        Ok(atom)
    }

    /// Get a clone of the atom's current value.
    pub fn get<T>(&self, atom: &KeyedAtom<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        Ok(inner.node_mut(atom)?.value.clone())
    }

    /// Write a value from outside the atom's effects.
    ///
    /// Every `on_set` handler runs, in registration order, even when the
    /// value is unchanged; subscribers run afterwards. A failing handler does
    /// not stop the others: the first error is returned once all have run.
    pub fn set<T>(&self, atom: &KeyedAtom<T>, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.write(atom, Some(value), Origin::External)
    }

    /// Write the atom's default value from outside its effects.
    pub fn reset<T>(&self, atom: &KeyedAtom<T>) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.write(atom, None, Origin::External)
    }

    /// Observe committed values of an atom.
    pub fn subscribe<T, F>(&self, atom: &KeyedAtom<T>, observer: F) -> Result<Subscription>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let observer_id = inner.next_observer;
        inner.next_observer += 1;
        inner
            .node_mut(atom)?
            .observers
            .push((observer_id, Arc::new(observer)));

        let registry = self.downgrade();
        let atom = atom.clone();
        Ok(Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                let mut inner = registry.inner.lock();
                if let Ok(node) = inner.node_mut(&atom) {
                    node.observers.retain(|(id, _)| *id != observer_id);
                }
            }
        }))
    }

    /// Number of writes the atom has received, from any origin.
    pub fn version<T>(&self, atom: &KeyedAtom<T>) -> Result<u64>
    where
        T: Send + Sync + 'static,
    {
        Ok(self.inner.lock().node_mut(atom)?.version)
    }

    /// Dispose of an atom, dropping its handlers and subscribers.
    pub fn dispose<T>(&self, atom: &KeyedAtom<T>)
    where
        T: Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        if let Ok(node) = inner.node_mut(atom) {
            node.disposed = true;
            node.handlers.clear();
            node.observers.clear();
        }
    }

    /// Register an `on_set` handler. Mirror handlers run before every
    /// ordinary handler, in their own registration order.
    pub(crate) fn add_handler<T>(
        &self,
        atom: &KeyedAtom<T>,
        owner: usize,
        handler: SetHandler<T>,
        mirror: bool,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let node = inner.node_mut(atom)?;
        if mirror {
            node.handlers.insert(node.mirrors, (owner, handler));
            node.mirrors += 1;
        } else {
            node.handlers.push((owner, handler));
        }
        Ok(())
    }

    /// Forget an atom entirely, releasing its key.
    pub(crate) fn remove<T>(&self, atom: &KeyedAtom<T>) {
        let mut inner = self.inner.lock();
        inner.nodes.remove(&atom.id());
        let released = match inner.keys.get_mut(atom.key()) {
            Some(seen) => {
                *seen -= 1;
                *seen == 0
            }
            None => false,
        };
        if released {
            inner.keys.remove(atom.key());
        }
    }

    /// Commit a write and notify. `None` writes the default value.
    pub(crate) fn write<T>(
        &self,
        atom: &KeyedAtom<T>,
        value: Option<T>,
        origin: Origin,
    ) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (new, old, handlers, observers) = {
            let mut inner = self.inner.lock();
            let node = inner.node_mut(atom)?;
            let new = value.unwrap_or_else(|| node.default.clone());
            let old = std::mem::replace(&mut node.value, new.clone());
            node.version += 1;
            let handlers = node
                .handlers
                .iter()
                .filter(|(owner, _)| origin != Origin::Effect(*owner))
                .map(|(_, handler)| Arc::clone(handler))
                .collect::<Vec<_>>();
            let observers = node
                .observers
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect::<Vec<_>>();
            (new, old, handlers, observers)
        };

        // Every handler runs; the first error is returned.
        let mut outcome = Ok(());
        for handler in &handlers {
            if let Err(err) = handler(&new, &old) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }

        if !observers.is_empty() {
            // A handler may have written again; observers see the latest value.
            let current = self.get(atom).unwrap_or(new);
            for observer in &observers {
                observer(&current);
            }
        }
        outcome
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A non-owning reference to a [`Registry`].
#[derive(Clone)]
pub(crate) struct WeakRegistry {
    inner: Weak<Mutex<RegistryInner>>,
}

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<Registry> {
        self.inner.upgrade().map(|inner| Registry { inner })
    }
}
