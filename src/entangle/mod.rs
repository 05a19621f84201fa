//! Entangled atoms.
//!
//! An entangled pair links an [`Atom`](crate::store::Atom) in a
//! [`Store`](crate::store::Store) with a [`KeyedAtom`](crate::registry::KeyedAtom)
//! in a [`Registry`](crate::registry::Registry). Each side keeps a shadow of
//! the last value it saw; a write is mirrored to the other side only when it
//! differs from that shadow, which stops echoes without re-entrancy flags.
//! Mirroring is synchronous: when a write returns, both sides agree.

mod entangle;
mod pair;

pub use entangle::{default_equals, entangled_atom, Entanglement, EqualsFn};
pub use pair::{EntangledPair, PairState};
