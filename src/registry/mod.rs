//! Keyed atom registry.
//!
//! Atoms are created with a key, a default value and a list of
//! [effects](crate::effect) that can observe and write them.

mod atom;
mod registry;

pub use atom::{AtomOptions, KeyedAtom};
pub(crate) use registry::{Origin, WeakRegistry};
pub use registry::Registry;
