//! # Entangle
//!
//! Keep atoms in two independent reactive stores synchronized.
//!
//! Entangle provides two kinds of atom containers and a bridge between them:
//!
//! ## Store (unkeyed atoms)
//!
//! - `Atom<T>` - A handle whose value lives in a store
//! - `Store` - Reads, writes and change subscriptions for atoms
//!
//! ## Registry (keyed atoms)
//!
//! - `KeyedAtom<T>` - An atom created under a key with a default value
//! - `Registry` - Runs lifecycle effects and `on_set` handlers on writes
//!
//! ## Entanglement
//!
//! - `entangled_atom` - Create a keyed atom that mirrors a store atom
//! - `EntangledPair<T>` - Inspect and recover a pair
//!
//! ```
//! use entangle::{entangled_atom, Atom, Runtime};
//!
//! Runtime::scope(|| {
//!     let count = Atom::new(5);
//!     let keyed = entangled_atom(&count, "count", Vec::new()).unwrap();
//!
//!     let runtime = Runtime::current();
//!     runtime.registry().set(&keyed, 7).unwrap();
//!     assert_eq!(runtime.store().get(&count).unwrap(), 7);
//! });
//! ```

pub mod effect;
pub mod entangle;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use effect::{clear_on_cwd_change, AtomEffect, CwdNotifier, EffectContext};
pub use entangle::{entangled_atom, EntangledPair, Entanglement, PairState};
pub use error::{Error, Result};
pub use registry::{AtomOptions, KeyedAtom, Registry};
pub use runtime::Runtime;
pub use store::{Atom, Store, Subscription};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let runtime = Runtime::new();
        let atom = Atom::new(0);
        let pair = Entanglement::new(&atom, "smoke").establish(&runtime).unwrap();
        runtime.store().set(&atom, 42).unwrap();
        assert_eq!(runtime.registry().get(pair.atom()).unwrap(), 42);
    }
}
