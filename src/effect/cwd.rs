use super::{from_fn, AtomEffect};
use crate::error::Result;
use crate::store::Subscription;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

type CwdListener = Arc<dyn Fn(&Path) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct CwdInner {
    current: Option<PathBuf>,
    listeners: Vec<(usize, CwdListener)>,
    next_listener: usize,
}

/// Publishes changes of the active working directory / repository.
#[derive(Clone, Default)]
pub struct CwdNotifier {
    inner: Arc<Mutex<CwdInner>>,
}

impl CwdNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently announced working directory.
    pub fn current(&self) -> Option<PathBuf> {
        self.inner.lock().current.clone()
    }

    /// Call `listener` whenever the working directory changes.
    pub fn on_cwd_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Path) -> Result<()> + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.push((id, Arc::new(listener)));

        let notifier = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(notifier) = notifier.upgrade() {
                notifier.lock().listeners.retain(|(other, _)| *other != id);
            }
        })
    }

    /// Announce a working directory.
    ///
    /// Announcing the current directory again is not a change. Every
    /// listener runs; the first error is returned.
    pub fn notify(&self, cwd: impl Into<PathBuf>) -> Result<()> {
        let cwd = cwd.into();
        let listeners = {
            let mut inner = self.inner.lock();
            if inner.current.as_ref() == Some(&cwd) {
                return Ok(());
            }
            inner.current = Some(cwd.clone());
            inner
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect::<Vec<_>>()
        };

        debug!(cwd = %cwd.display(), listeners = listeners.len(), "working directory changed");
        let mut outcome = Ok(());
        for listener in listeners {
            if let Err(err) = listener(&cwd) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }
        outcome
    }
}

/// An effect that resets its atom to the default value whenever the working
/// directory changes.
pub fn clear_on_cwd_change<T>(notifier: &CwdNotifier) -> AtomEffect<T>
where
    T: Clone + Send + Sync + 'static,
{
    let notifier = notifier.clone();
    from_fn(move |ctx| {
        let handle = ctx.handle();
        notifier
            .on_cwd_changed(move |_| handle.reset_self())
            .detach();
        Ok(())
    })
}
