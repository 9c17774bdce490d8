use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::{Cleanup, Effect, Host, HostError, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    TearingDown,
    Destroyed,
}

impl Phase {
    const fn check(self) -> Result<(), HostError> {
        match self {
            Self::Active => Ok(()),
            Self::TearingDown => Err(HostError::CreateDuringTeardown),
            Self::Destroyed => Err(HostError::Destroyed),
        }
    }
}

struct State {
    phase: Phase,
    effects: Vec<Effect>,
    cleanups: Vec<Cleanup>,
}

struct Inner {
    state: Mutex<State>,
    revision: AtomicU64,
    changed: Notify,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.phase == Phase::Active {
            state.phase = Phase::TearingDown;
            let cleanups = mem::take(&mut state.cleanups);
            state.effects.clear();
            run_cleanups(cleanups);
        }
    }
}

fn run_cleanups(cleanups: Vec<Cleanup>) {
    debug!(cleanups = cleanups.len(), "tearing down scope");
    for cleanup in cleanups.into_iter().rev() {
        cleanup();
    }
}

/// A deterministic host scope.
///
/// A `Scope` owns the effects and cleanups registered in it. Effects re-run on
/// [`Scope::flush`]; cleanups run in reverse registration order on
/// [`Scope::destroy`], or when the last clone of the scope is dropped.
///
/// Notifications from reactive state (signal writes, query deliveries) bump
/// [`Scope::revision`] and wake [`Scope::changed`], which lets an async update loop
/// re-render only when something changed.
///
/// # Example
///
/// ```
/// use live_query::host::{Host, Scope};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let scope = Scope::new();
/// let runs = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&runs);
/// scope
///     .create_effect(Box::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }))
///     .unwrap();
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
///
/// scope.flush();
/// assert_eq!(runs.load(Ordering::SeqCst), 2);
///
/// scope.destroy();
/// assert!(scope.is_destroyed());
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

impl Scope {
    /// Creates an active scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    phase: Phase::Active,
                    effects: Vec::new(),
                    cleanups: Vec::new(),
                }),
                revision: AtomicU64::new(0),
                changed: Notify::new(),
            }),
        }
    }

    /// Re-runs every registered effect and returns how many ran.
    ///
    /// Effects created while flushing are kept but first run on creation only.
    pub fn flush(&self) -> usize {
        let mut effects = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Active {
                return 0;
            }
            mem::take(&mut state.effects)
        };

        for effect in &mut effects {
            effect();
        }
        let ran = effects.len();

        let mut state = self.inner.state.lock();
        if state.phase == Phase::Active {
            let created = mem::replace(&mut state.effects, effects);
            state.effects.extend(created);
        } else {
            drop(state);
            drop(effects);
        }
        ran
    }

    /// Destroys the scope, running every cleanup synchronously.
    ///
    /// Destroying an already destroyed scope does nothing.
    pub fn destroy(&self) {
        let (cleanups, effects) = {
            let mut state = self.inner.state.lock();
            if state.phase != Phase::Active {
                return;
            }
            state.phase = Phase::TearingDown;
            (
                mem::take(&mut state.cleanups),
                mem::take(&mut state.effects),
            )
        };

        run_cleanups(cleanups);
        drop(effects);
        self.inner.state.lock().phase = Phase::Destroyed;
    }

    /// Returns `true` once [`Scope::destroy`] has completed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().phase == Phase::Destroyed
    }

    /// Number of registered effects.
    #[must_use]
    pub fn effect_count(&self) -> usize {
        self.inner.state.lock().effects.len()
    }

    /// Number of notifications received so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::SeqCst)
    }

    /// Signals a change of reactive state.
    pub fn notify(&self) {
        notify(&self.inner);
    }

    /// Waits for the next notification.
    ///
    /// A notification sent while nobody is waiting is remembered, so a change
    /// between two calls is never missed.
    pub async fn changed(&self) {
        self.inner.changed.notified().await;
    }
}

fn notify(inner: &Inner) {
    inner.revision.fetch_add(1, Ordering::SeqCst);
    inner.changed.notify_one();
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scope")
            .field("phase", &state.phase)
            .field("effects", &state.effects.len())
            .field("cleanups", &state.cleanups.len())
            .field("revision", &self.revision())
            .finish()
    }
}

impl Host for Scope {
    fn create_effect(&self, mut effect: Effect) -> Result<(), HostError> {
        self.inner.state.lock().phase.check()?;

        // Run unlocked: the effect may create nested effects or notify.
        effect();

        let mut state = self.inner.state.lock();
        state.phase.check()?;
        state.effects.push(effect);
        Ok(())
    }

    fn on_cleanup(&self, cleanup: Cleanup) -> Result<(), HostError> {
        let mut state = self.inner.state.lock();
        state.phase.check()?;
        state.cleanups.push(cleanup);
        Ok(())
    }

    fn notifier(&self) -> Notifier {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Notifier::new(move || {
            if let Some(inner) = inner.upgrade() {
                notify(&inner);
            }
        })
    }
}
