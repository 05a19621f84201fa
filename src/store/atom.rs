use crate::runtime::next_id;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A handle to an atom living in a [`Store`](super::Store).
///
/// The handle itself holds no value: it only carries the initial value the
/// store materialises on first access. Clones refer to the same atom, and the
/// same atom can hold different values in different stores.
pub struct Atom<T> {
    id: usize,
    initial: Arc<T>,
    label: Arc<Mutex<Option<String>>>,
}

impl<T> Atom<T> {
    /// Create a new atom with the given initial value.
    pub fn new(initial: T) -> Self {
        Self {
            id: next_id(),
            initial: Arc::new(initial),
            label: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a new atom carrying a debug label.
    pub fn with_label(initial: T, label: impl Into<String>) -> Self {
        let atom = Self::new(initial);
        atom.set_debug_label(label);
        atom
    }

    /// Attach a debug label, shared with every clone of this handle.
    pub fn set_debug_label(&self, label: impl Into<String>) {
        *self.label.lock() = Some(label.into());
    }

    pub fn debug_label(&self) -> Option<String> {
        self.label.lock().clone()
    }

    /// The debug label, or a generated `atom<id>` name.
    pub fn label(&self) -> String {
        self.debug_label()
            .unwrap_or_else(|| format!("atom{}", self.id))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn initial(&self) -> &T {
        &self.initial
    }
}

impl<T> Clone for Atom<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            initial: Arc::clone(&self.initial),
            label: Arc::clone(&self.label),
        }
    }
}

impl<T> fmt::Debug for Atom<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("label", &self.debug_label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_label() {
        let atom = Atom::new(1);
        let clone = atom.clone();
        assert_eq!(clone.debug_label(), None);

        atom.set_debug_label("count");
        assert_eq!(clone.debug_label().as_deref(), Some("count"));
        assert_eq!(clone.id(), atom.id());
    }

    #[test]
    fn unlabelled_atoms_get_generated_name() {
        let atom = Atom::new(());
        assert_eq!(atom.label(), format!("atom{}", atom.id()));
    }
}
