use crate::effect::AtomEffect;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A handle to an atom created by a [`Registry`](super::Registry).
///
/// Keyed atoms are created together with their value, so a handle only has
/// meaning inside the registry that created it.
pub struct KeyedAtom<T> {
    id: usize,
    key: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> KeyedAtom<T> {
    pub(crate) fn new(id: usize, key: Arc<str>) -> Self {
        Self {
            id,
            key,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl<T> Clone for KeyedAtom<T> {
    fn clone(&self) -> Self {
        Self::new(self.id, Arc::clone(&self.key))
    }
}

impl<T> PartialEq for KeyedAtom<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for KeyedAtom<T> {}

impl<T> fmt::Debug for KeyedAtom<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedAtom")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

/// Options for [`Registry::atom`](super::Registry::atom).
pub struct AtomOptions<T> {
    pub key: String,
    pub default: T,
    pub effects: Vec<AtomEffect<T>>,
}

impl<T> AtomOptions<T> {
    pub fn new(key: impl Into<String>, default: T) -> Self {
        Self {
            key: key.into(),
            default,
            effects: Vec::new(),
        }
    }

    /// Append an effect. Effects run in the order they were added.
    pub fn effect(mut self, effect: AtomEffect<T>) -> Self {
        self.effects.push(effect);
        self
    }
}
