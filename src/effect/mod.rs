//! Lifecycle hooks for keyed atoms.
//!
//! - [`AtomEffect`]: a hook run once when a keyed atom is created
//! - [`EffectContext`]: what the hook can do with its atom
//! - [`clear_on_cwd_change`]: reset an atom when the working directory changes

mod cwd;
mod effect;

pub use cwd::{clear_on_cwd_change, CwdNotifier};
pub use effect::{from_fn, AtomEffect, EffectContext, SelfHandle};
