//! The host framework boundary.
//!
//! A live query needs two things from the UI framework it runs in: an effect that
//! re-runs whenever the framework re-evaluates the owning scope, with a cleanup
//! that runs synchronously when the scope is destroyed, and a way to tell the
//! framework that reactive state changed. [`Host`] captures exactly that, so the
//! query state machine stays framework-agnostic.
//!
//! [`Scope`] is a deterministic implementation of [`Host`]: re-evaluation happens
//! when [`Scope::flush`] is called and teardown when [`Scope::destroy`] is called
//! (or the last clone is dropped). It serves both as a host for applications that
//! drive their own update loop and as the fake scheduler in tests.
//!
//! # Call-site stability
//!
//! Queries must be created unconditionally, once per logical query slot, while the
//! scope is active; conditional activation is expressed with
//! [`QueryArgs::Skip`](crate::args::QueryArgs::Skip). Creating effects while a
//! scope tears down interleaves subscription setup with cleanup, so hosts reject
//! it with [`HostError::CreateDuringTeardown`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

mod scope;
mod signal;

pub use scope::Scope;
pub use signal::Signal;

/// A re-runnable effect.
pub type Effect = Box<dyn FnMut() + Send>;

/// A cleanup run once when the owning scope is destroyed.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Error type for host operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
    #[error("Cannot create an effect while its scope is tearing down")]
    CreateDuringTeardown,

    #[error("Scope has already been destroyed")]
    Destroyed,
}

/// Tells the host that reactive state changed and dependents should re-render.
///
/// Notifiers are cheap to clone and may be called from any thread. They hold no
/// strong reference to their host, so notifying a destroyed host does nothing.
#[derive(Clone)]
pub struct Notifier(Arc<dyn Fn() + Send + Sync>);

impl Notifier {
    /// Wraps a notification callback.
    pub fn new(notify: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(notify))
    }

    /// A notifier that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn notify(&self) {
        (self.0)();
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Notifier")
    }
}

/// The reactive capability a live query needs from its host framework.
pub trait Host {
    /// Registers an effect for the lifetime of the scope.
    ///
    /// Implementations must run `effect` once synchronously before returning, and
    /// again on every re-evaluation of the scope.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::CreateDuringTeardown`] while the scope is tearing down
    /// and [`HostError::Destroyed`] afterwards.
    fn create_effect(&self, effect: Effect) -> Result<(), HostError>;

    /// Registers a cleanup that runs synchronously when the scope is destroyed.
    ///
    /// # Errors
    ///
    /// Same as [`Host::create_effect`].
    fn on_cleanup(&self, cleanup: Cleanup) -> Result<(), HostError>;

    /// Returns a notifier that signals a change of reactive state.
    fn notifier(&self) -> Notifier;
}
