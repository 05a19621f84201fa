//! The default pair of stores shared by application code.
//!
//! This module provides the process-wide stores and scoped replacements for
//! tests and isolated contexts.

mod context;

pub(crate) use context::next_id;
pub use context::Runtime;
