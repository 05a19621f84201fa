//! Unkeyed atom store.
//!
//! Atoms are plain handles; their values live in a [`Store`], which notifies
//! subscribers synchronously on every write.

mod atom;
mod store;
mod subscription;

pub use atom::Atom;
pub(crate) use store::WeakStore;
pub use store::Store;
pub use subscription::Subscription;
