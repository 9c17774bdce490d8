use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Host, Notifier};

/// A reactive read/write cell.
///
/// Writing a signal notifies its host, which re-evaluates dependents on the next
/// flush. Signals are the usual source of query arguments:
///
/// ```
/// use live_query::host::{Scope, Signal};
///
/// let scope = Scope::new();
/// let selected = Signal::new(&scope, None::<u64>);
///
/// selected.set(Some(7));
/// assert_eq!(selected.get(), Some(7));
/// assert_eq!(scope.revision(), 1);
/// ```
pub struct Signal<T> {
    value: Arc<RwLock<T>>,
    notifier: Notifier,
}

impl<T> Signal<T> {
    /// Creates a signal bound to `host`.
    pub fn new(host: &impl Host, value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
            notifier: host.notifier(),
        }
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.read().clone()
    }

    /// Reads the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Replaces the value and notifies the host.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.notifier.notify();
    }

    /// Modifies the value in place and notifies the host.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.write());
        self.notifier.notify();
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            notifier: self.notifier.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&*self.value.read()).finish()
    }
}
