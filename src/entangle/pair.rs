use super::EqualsFn;
use crate::error::{Direction, Error, Result};
use crate::registry::{KeyedAtom, Registry, WeakRegistry};
use crate::store::{Atom, Store, WeakStore};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{trace, warn};

/// Where an entangled pair is in its propagation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairState {
    /// Both shadows match the value held by both atoms.
    Idle,
    /// A write is being pushed to the other side.
    Propagating,
    /// The last propagation failed; the two sides may disagree until the
    /// next successful propagation or [`EntangledPair::resync`].
    Desynchronized,
}

/// Last value seen on each side.
struct Shadows<T> {
    registry: T,
    store: T,
}

#[derive(Default)]
struct Status {
    depth: usize,
    failed: bool,
}

/// State shared by the two halves of the bridge.
pub(crate) struct PairShared<T> {
    key: Arc<str>,
    shadows: Mutex<Shadows<T>>,
    status: Mutex<Status>,
    equals: EqualsFn<T>,
}

impl<T: Clone + Send + Sync + 'static> PairShared<T> {
    pub(crate) fn new(key: &str, seed: T, equals: EqualsFn<T>) -> Self {
        Self {
            key: key.into(),
            shadows: Mutex::new(Shadows {
                registry: seed.clone(),
                store: seed,
            }),
            status: Mutex::new(Status::default()),
            equals,
        }
    }

    /// The registry atom was written; mirror into the store unless the store
    /// already holds the value.
    pub(crate) fn registry_changed(&self, new: &T, store: &WeakStore, atom: &Atom<T>) -> Result<()> {
        {
            let mut shadows = self.shadows.lock();
            if (self.equals)(&shadows.store, new) {
                trace!(key = %self.key, "store already up to date");
                return Ok(());
            }
            shadows.registry = new.clone();
        }

        self.propagate(
            Direction::RegistryToStore,
            || {
                let store = store.upgrade().ok_or_else(|| Error::Disposed {
                    label: atom.label(),
                })?;
                store.set(atom, new.clone())
            },
            || store.upgrade().and_then(|store| store.get(atom).ok()),
        )
    }

    /// The store atom was written; mirror into the registry unless the
    /// registry already holds the value.
    pub(crate) fn store_changed(
        &self,
        store: &WeakStore,
        atom: &Atom<T>,
        registry: &WeakRegistry,
        keyed: &KeyedAtom<T>,
    ) -> Result<()> {
        let store = store.upgrade().ok_or_else(|| Error::Disposed {
            label: atom.label(),
        })?;
        let value = store.get(atom)?;
        {
            let mut shadows = self.shadows.lock();
            shadows.store = value.clone();
            if (self.equals)(&shadows.registry, &value) {
                trace!(key = %self.key, "registry already up to date");
                return Ok(());
            }
            shadows.registry = value.clone();
        }

        self.propagate(
            Direction::StoreToRegistry,
            || {
                let registry = registry.upgrade().ok_or_else(|| Error::Disposed {
                    label: keyed.key().to_string(),
                })?;
                registry.set(keyed, value.clone())
            },
            || registry.upgrade().and_then(|registry| registry.get(keyed).ok()),
        )
    }

    /// Run `write` against the other side.
    ///
    /// A write can commit and still fail because a hook or subscriber further
    /// down rejected it. When `read_back` shows the other side agreeing with
    /// this side afterwards, the pair is intact and that error goes back to
    /// the writer as is. Only a real split becomes a `SyncFailure`.
    fn propagate<W, R>(&self, direction: Direction, write: W, read_back: R) -> Result<()>
    where
        W: FnOnce() -> Result<()>,
        R: FnOnce() -> Option<T>,
    {
        trace!(key = %self.key, %direction, "propagating");
        self.status.lock().depth += 1;
        let outcome = write();
        let source = match outcome {
            Ok(()) => None,
            Err(err) => Some((err, self.agrees(direction, read_back()))),
        };

        let mut status = self.status.lock();
        status.depth -= 1;
        match source {
            None => {
                if status.depth == 0 {
                    status.failed = false;
                }
                Ok(())
            }
            Some((source, true)) => {
                if status.depth == 0 {
                    status.failed = false;
                }
                trace!(key = %self.key, %direction, error = %source, "write mirrored, downstream failed");
                Err(source)
            }
            Some((source, false)) => {
                status.failed = true;
                warn!(key = %self.key, %direction, error = %source, "entangled pair desynchronized");
                Err(Error::SyncFailure {
                    key: self.key.to_string(),
                    direction,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Whether `held`, read from the written side, matches this side's shadow.
    fn agrees(&self, direction: Direction, held: Option<T>) -> bool {
        let Some(held) = held else {
            return false;
        };
        let shadows = self.shadows.lock();
        let source = match direction {
            Direction::RegistryToStore => &shadows.registry,
            Direction::StoreToRegistry => &shadows.store,
        };
        (self.equals)(source, &held)
    }

    fn state(&self) -> PairState {
        let status = self.status.lock();
        if status.depth > 0 {
            PairState::Propagating
        } else if status.failed {
            PairState::Desynchronized
        } else {
            PairState::Idle
        }
    }
}

/// One store atom and one registry atom kept equal under a shared key.
///
/// The pair keeps working for as long as both stores live; dropping this
/// handle does not undo the entanglement.
pub struct EntangledPair<T> {
    pub(crate) shared: Arc<PairShared<T>>,
    pub(crate) atom: KeyedAtom<T>,
    pub(crate) store_atom: Atom<T>,
    pub(crate) store: WeakStore,
    pub(crate) registry: WeakRegistry,
}

impl<T> Clone for EntangledPair<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            atom: self.atom.clone(),
            store_atom: self.store_atom.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> EntangledPair<T> {
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// The registry side of the pair.
    pub fn atom(&self) -> &KeyedAtom<T> {
        &self.atom
    }

    /// The store side of the pair.
    pub fn store_atom(&self) -> &Atom<T> {
        &self.store_atom
    }

    pub fn state(&self) -> PairState {
        self.shared.state()
    }

    /// The last values seen on the registry and store sides.
    pub fn shadows(&self) -> (T, T) {
        let shadows = self.shared.shadows.lock();
        (shadows.registry.clone(), shadows.store.clone())
    }

    /// Whether both atoms and both shadows hold the same value.
    pub fn is_consistent(&self) -> Result<bool> {
        let equals = self.shared.equals;
        let in_registry = self.registry()?.get(&self.atom)?;
        let in_store = self.store()?.get(&self.store_atom)?;
        let (shadow_registry, shadow_store) = self.shadows();
        Ok(equals(&in_registry, &in_store)
            && equals(&in_store, &shadow_store)
            && equals(&shadow_store, &shadow_registry))
    }

    /// Realign the registry side with the store after a failed propagation.
    ///
    /// The store's value wins. On success the pair is idle again.
    pub fn resync(&self) -> Result<()> {
        let value = self.store()?.get(&self.store_atom)?;
        {
            let mut shadows = self.shared.shadows.lock();
            shadows.store = value.clone();
            shadows.registry = value.clone();
        }
        self.registry()?.set(&self.atom, value)?;
        self.shared.status.lock().failed = false;
        trace!(key = %self.shared.key, "entangled pair resynchronized");
        Ok(())
    }

    fn store(&self) -> Result<Store> {
        self.store.upgrade().ok_or_else(|| Error::Disposed {
            label: self.store_atom.label(),
        })
    }

    fn registry(&self) -> Result<Registry> {
        self.registry.upgrade().ok_or_else(|| Error::Disposed {
            label: self.atom.key().to_string(),
        })
    }
}
