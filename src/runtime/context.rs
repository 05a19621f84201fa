use crate::registry::Registry;
use crate::store::Store;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Generate the next process-unique ID for an atom.
pub(crate) fn next_id() -> usize {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A pair of stores application code shares: the unkeyed [`Store`] and the
/// keyed [`Registry`].
///
/// Supports both a global runtime (default) and scoped runtimes for
/// isolation.
///
/// # Examples
///
/// Using the default global runtime:
///
/// ```
/// use entangle::runtime::Runtime;
/// use entangle::store::Atom;
///
/// let atom = Atom::new(42);
/// assert_eq!(Runtime::current().store().get(&atom).unwrap(), 42);
/// ```
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use entangle::runtime::Runtime;
/// use entangle::store::Atom;
///
/// let atom = Atom::new(0);
/// Runtime::scope(|| {
///     Runtime::current().store().set(&atom, 1).unwrap();
/// });
/// // The scoped stores are dropped here
/// assert_eq!(Runtime::current().store().get(&atom).unwrap(), 0);
/// ```
pub struct Runtime {
    store: Store,
    registry: Registry,
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<Runtime>>> = const { RefCell::new(Vec::new()) };
}

impl Runtime {
    /// Create a new runtime with empty stores.
    pub fn new() -> Arc<Self> {
        Arc::new(Runtime {
            store: Store::new(),
            registry: Registry::new(),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime and all its state is dropped when the function returns,
    /// unless the function keeps a handle to it.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_runtime(Self::new(), f)
    }

    /// Get or create the global runtime (fallback).
    pub fn global() -> Arc<Self> {
        static RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// Get the current runtime (scoped or global fallback).
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific runtime as the current context.
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
