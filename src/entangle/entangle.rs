use super::pair::{EntangledPair, PairShared};
use crate::effect::{from_fn, AtomEffect};
use crate::error::Result;
use crate::registry::{AtomOptions, KeyedAtom};
use crate::runtime::Runtime;
use crate::store::{Atom, WeakStore};
use std::sync::Arc;
use tracing::debug;

/// Equality used to tell a genuine change from an echo.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Structural equality through [`PartialEq`].
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Builder for an entangled pair.
///
/// # Examples
///
/// ```
/// use entangle::entangle::Entanglement;
/// use entangle::runtime::Runtime;
/// use entangle::store::Atom;
///
/// let runtime = Runtime::new();
/// let count = Atom::new(5);
/// let pair = Entanglement::new(&count, "count").establish(&runtime).unwrap();
///
/// runtime.registry().set(pair.atom(), 7).unwrap();
/// assert_eq!(runtime.store().get(&count).unwrap(), 7);
///
/// runtime.store().set(&count, 9).unwrap();
/// assert_eq!(runtime.registry().get(pair.atom()).unwrap(), 9);
/// ```
pub struct Entanglement<T> {
    atom: Atom<T>,
    key: String,
    effects: Vec<AtomEffect<T>>,
    equals: EqualsFn<T>,
    debug_label: bool,
}

impl<T: PartialEq> Entanglement<T> {
    pub fn new(atom: &Atom<T>, key: impl Into<String>) -> Self {
        Self::with_equals(atom, key, default_equals::<T>)
    }
}

impl<T> Entanglement<T> {
    /// Start a pair compared with a custom equality.
    pub fn with_equals(atom: &Atom<T>, key: impl Into<String>, equals: EqualsFn<T>) -> Self {
        Self {
            atom: atom.clone(),
            key: key.into(),
            effects: Vec::new(),
            equals,
            debug_label: true,
        }
    }

    /// Extra effects for the registry atom. Their `on_set` handlers run after
    /// the mirror's, so both sides already agree when they see a write.
    pub fn effects(mut self, effects: impl IntoIterator<Item = AtomEffect<T>>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn effect(mut self, effect: AtomEffect<T>) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn equals(mut self, equals: EqualsFn<T>) -> Self {
        self.equals = equals;
        self
    }

    /// Label the store atom with the key (on by default).
    pub fn debug_label(mut self, enabled: bool) -> Self {
        self.debug_label = enabled;
        self
    }
}

impl<T: Clone + Send + Sync + 'static> Entanglement<T> {
    /// Create the registry atom and link it to the store atom.
    pub fn establish(self, runtime: &Runtime) -> Result<EntangledPair<T>> {
        let Entanglement {
            atom,
            key,
            mut effects,
            equals,
            debug_label,
        } = self;
        let store = runtime.store();
        let registry = runtime.registry();

        let seed = store.get(&atom)?;
        if debug_label {
            atom.set_debug_label(key.clone());
        }
        let shared = Arc::new(PairShared::new(&key, seed.clone(), equals));

        effects.push(mirror_into_store(
            Arc::clone(&shared),
            store.downgrade(),
            atom.clone(),
        ));
        let keyed = registry.atom(AtomOptions {
            key,
            default: seed,
            effects,
        })?;

        let listener = {
            let shared = Arc::clone(&shared);
            let (weak_store, weak_registry) = (store.downgrade(), registry.downgrade());
            let (atom, keyed) = (atom.clone(), keyed.clone());
            move || shared.store_changed(&weak_store, &atom, &weak_registry, &keyed)
        };
        let subscription = match store.sub_mirror(&atom, listener) {
            Ok(subscription) => subscription,
            Err(err) => {
                registry.remove(&keyed);
                return Err(err);
            }
        };

        // An effect may have written its atom before the mirror was registered.
        let initial = registry
            .get(&keyed)
            .and_then(|initial| shared.registry_changed(&initial, &store.downgrade(), &atom));
        if let Err(err) = initial {
            drop(subscription);
            registry.remove(&keyed);
            return Err(err);
        }
        subscription.detach();

        debug!(key = %keyed.key(), "entangled atom established");
        Ok(EntangledPair {
            shared,
            atom: keyed,
            store_atom: atom,
            store: store.downgrade(),
            registry: registry.downgrade(),
        })
    }
}

/// The synthetic effect that pushes registry writes into the store.
fn mirror_into_store<T>(shared: Arc<PairShared<T>>, store: WeakStore, atom: Atom<T>) -> AtomEffect<T>
where
    T: Clone + Send + Sync + 'static,
{
    from_fn(move |ctx| {
        ctx.on_set_mirror(move |new, _old| shared.registry_changed(new, &store, &atom))
    })
}

/// Create a registry atom entangled with `atom` in the current runtime.
///
/// The registry atom starts with the store atom's current value. From then
/// on a write to either side is mirrored into the other before the write
/// returns. `effects` run on the registry atom in addition to the mirror.
pub fn entangled_atom<T>(
    atom: &Atom<T>,
    key: impl Into<String>,
    effects: Vec<AtomEffect<T>>,
) -> Result<KeyedAtom<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let pair = Entanglement::new(atom, key)
        .effects(effects)
        .establish(&Runtime::current())?;
    Ok(pair.atom().clone())
}
