//! Error types shared by both stores and the bridge.

use std::fmt;
use thiserror::Error;

/// Which way a propagation was travelling when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// A registry write being mirrored into the store.
    RegistryToStore,
    /// A store write being mirrored into the registry.
    StoreToRegistry,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::RegistryToStore => f.write_str("registry -> store"),
            Direction::StoreToRegistry => f.write_str("store -> registry"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("atom `{label}` has been disposed")]
    Disposed { label: String },

    #[error("atom `{label}` holds a value of a different type")]
    TypeMismatch { label: String },

    #[error("atom `{label}` does not belong to this registry")]
    UnknownAtom { label: String },

    #[error("entangled pair `{key}` failed to propagate ({direction}): {source}")]
    SyncFailure {
        key: String,
        direction: Direction,
        #[source]
        source: Box<Error>,
    },

    #[error("effect on atom `{key}` failed: {message}")]
    Effect { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_failure_names_key_and_direction() {
        let err = Error::SyncFailure {
            key: "count".to_string(),
            direction: Direction::RegistryToStore,
            source: Box::new(Error::Disposed {
                label: "count".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("`count`"));
        assert!(msg.contains("registry -> store"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
