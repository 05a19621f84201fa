use crate::error::{Error, Result};
use crate::registry::{KeyedAtom, Origin, WeakRegistry};
use std::sync::Arc;

/// A lifecycle hook run once when a keyed atom is created.
///
/// # Examples
///
/// ```
/// use entangle::effect;
/// use entangle::registry::{AtomOptions, Registry};
///
/// let registry = Registry::new();
/// let atom = registry
///     .atom(AtomOptions::new("greeting", String::new()).effect(effect::from_fn(|ctx| {
///         ctx.set_self("hello".to_string())
///     })))
///     .unwrap();
///
/// assert_eq!(registry.get(&atom).unwrap(), "hello");
/// ```
pub type AtomEffect<T> = Box<dyn FnOnce(&EffectContext<T>) -> Result<()> + Send>;

/// Box a closure as an [`AtomEffect`].
pub fn from_fn<T, F>(effect: F) -> AtomEffect<T>
where
    F: FnOnce(&EffectContext<T>) -> Result<()> + Send + 'static,
{
    Box::new(effect)
}

/// A clonable handle an effect can keep to write its own atom later.
///
/// The handle does not keep the registry alive.
pub struct SelfHandle<T> {
    registry: WeakRegistry,
    atom: KeyedAtom<T>,
    owner: usize,
}

impl<T> Clone for SelfHandle<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            atom: self.atom.clone(),
            owner: self.owner,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SelfHandle<T> {
    pub(crate) fn new(registry: WeakRegistry, atom: KeyedAtom<T>, owner: usize) -> Self {
        Self {
            registry,
            atom,
            owner,
        }
    }

    pub fn atom(&self) -> &KeyedAtom<T> {
        &self.atom
    }

    pub fn get(&self) -> Result<T> {
        self.registry()?.get(&self.atom)
    }

    /// Write the atom without notifying this effect's own `on_set` handler.
    pub fn set_self(&self, value: T) -> Result<()> {
        self.registry()?
            .write(&self.atom, Some(value), Origin::Effect(self.owner))
    }

    /// Write the atom's default value without notifying this effect's own
    /// `on_set` handler.
    pub fn reset_self(&self) -> Result<()> {
        self.registry()?
            .write(&self.atom, None, Origin::Effect(self.owner))
    }

    fn registry(&self) -> Result<crate::registry::Registry> {
        self.registry.upgrade().ok_or_else(|| Error::Disposed {
            label: self.atom.key().to_string(),
        })
    }
}

/// What an [`AtomEffect`] receives when its atom is created.
pub struct EffectContext<T> {
    handle: SelfHandle<T>,
}

impl<T: Clone + Send + Sync + 'static> EffectContext<T> {
    pub(crate) fn new(handle: SelfHandle<T>) -> Self {
        Self { handle }
    }

    pub fn key(&self) -> &str {
        self.handle.atom.key()
    }

    pub fn atom(&self) -> &KeyedAtom<T> {
        &self.handle.atom
    }

    /// A handle for writing this atom from later callbacks.
    pub fn handle(&self) -> SelfHandle<T> {
        self.handle.clone()
    }

    /// Register a handler called with `(new, old)` on every write not made by
    /// this effect.
    pub fn on_set<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&T, &T) -> Result<()> + Send + Sync + 'static,
    {
        self.handle
            .registry()?
            .add_handler(&self.handle.atom, self.handle.owner, Arc::new(handler), false)
    }

    /// Like [`on_set`](Self::on_set), but the handler runs ahead of every
    /// ordinary handler so it sees each write first.
    pub(crate) fn on_set_mirror<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&T, &T) -> Result<()> + Send + Sync + 'static,
    {
        self.handle
            .registry()?
            .add_handler(&self.handle.atom, self.handle.owner, Arc::new(handler), true)
    }

    pub fn set_self(&self, value: T) -> Result<()> {
        self.handle.set_self(value)
    }

    pub fn reset_self(&self) -> Result<()> {
        self.handle.reset_self()
    }
}
