//! The generation state machine behind a live query.
//!
//! Every change of resolved arguments starts a new *generation*. A subscription is
//! created per generation and its deliveries are tagged with that generation;
//! deliveries for any other generation are discarded. This module holds only the
//! state and its transitions. Calling into the client and the host happens in
//! [`super::use_query_with`], outside of the state lock.

use serde_json::Value;

use crate::args::QueryArgs;
use crate::client::{ClientError, SubscriptionHandle};

use super::{QueryOptions, QueryResult};

pub(crate) type Generation = u64;

/// What the caller must do after [`SubscriptionState::advance`].
pub(crate) enum Transition {
    /// Arguments are unchanged.
    Unchanged,
    /// The owning scope is gone; nothing to do.
    TornDown,
    /// Arguments became `Skip`. Release the old subscription, if any.
    Skipped {
        released: Option<Box<dyn SubscriptionHandle>>,
    },
    /// Release the old subscription, if any, then subscribe for `generation`.
    Subscribe {
        generation: Generation,
        args: Value,
        released: Option<Box<dyn SubscriptionHandle>>,
    },
}

pub(crate) struct SubscriptionState<T> {
    current_args: Option<QueryArgs>,
    args_changed: bool,
    generation: Generation,
    active: Option<Box<dyn SubscriptionHandle>>,
    data: Option<T>,
    error: Option<ClientError>,
    is_loading: bool,
    /// Last data shown from a delivery, seed or local result; the source for retention.
    retained: Option<T>,
    keep_previous_data: bool,
    torn_down: bool,
}

impl<T: Clone> SubscriptionState<T> {
    pub(crate) const fn new() -> Self {
        Self {
            current_args: None,
            args_changed: false,
            generation: 0,
            active: None,
            data: None,
            error: None,
            is_loading: false,
            retained: None,
            keep_previous_data: false,
            torn_down: false,
        }
    }

    /// Returns `true` if `args` are deep-equal to the subscribed arguments.
    pub(crate) fn is_current(&self, args: &QueryArgs) -> bool {
        self.current_args
            .as_ref()
            .is_some_and(|current| current.same_as(args))
    }

    /// Applies newly resolved arguments.
    ///
    /// `local` is a result the client already holds for `args`; it takes precedence
    /// over the seed and retained data.
    pub(crate) fn advance(
        &mut self,
        args: QueryArgs,
        options: &QueryOptions<T>,
        local: Option<T>,
    ) -> Transition {
        self.keep_previous_data = options.keep_previous_data;

        if self.torn_down {
            return Transition::TornDown;
        }
        if self.is_current(&args) {
            return Transition::Unchanged;
        }
        if self.current_args.is_some() {
            self.args_changed = true;
        }

        self.generation += 1;
        let released = self.active.take();
        self.current_args = Some(args.clone());
        self.error = None;

        let QueryArgs::Args(args) = args else {
            // Skip is a hard reset, retention included.
            self.data = None;
            self.retained = None;
            self.is_loading = false;
            return Transition::Skipped { released };
        };

        let seed = if self.args_changed {
            None
        } else {
            options.initial_data.clone()
        };

        if let Some(value) = local.or(seed) {
            self.retained = Some(value.clone());
            self.data = Some(value);
            self.is_loading = false;
        } else if self.keep_previous_data && self.retained.is_some() {
            self.data.clone_from(&self.retained);
            self.is_loading = false;
        } else {
            self.data = None;
            self.is_loading = true;
        }

        Transition::Subscribe {
            generation: self.generation,
            args,
            released,
        }
    }

    /// Stores the subscription created for `generation`.
    ///
    /// Returns the handle back if the generation was superseded (or the state torn
    /// down) while subscribing; the caller must release it.
    pub(crate) fn attach(
        &mut self,
        generation: Generation,
        handle: Box<dyn SubscriptionHandle>,
    ) -> Option<Box<dyn SubscriptionHandle>> {
        if self.torn_down || generation != self.generation {
            return Some(handle);
        }
        self.active = Some(handle);
        None
    }

    /// Applies a delivery. Returns `false` if it was discarded as stale.
    pub(crate) fn deliver(
        &mut self,
        generation: Generation,
        outcome: Result<T, ClientError>,
    ) -> bool {
        if self.torn_down || generation != self.generation {
            return false;
        }

        match outcome {
            Ok(value) => {
                self.retained = Some(value.clone());
                self.data = Some(value);
                self.error = None;
            }
            Err(error) => {
                self.data = if self.keep_previous_data {
                    self.retained.clone()
                } else {
                    None
                };
                self.error = Some(error);
            }
        }
        self.is_loading = false;
        true
    }

    /// Marks the state as torn down and hands out the active subscription.
    ///
    /// Every later delivery, for any generation, is discarded.
    pub(crate) fn teardown(&mut self) -> Option<Box<dyn SubscriptionHandle>> {
        self.torn_down = true;
        self.generation += 1;
        self.active.take()
    }

    pub(crate) fn snapshot(&self) -> QueryResult<T> {
        QueryResult {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
        }
    }

    pub(crate) const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub(crate) const fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub(crate) const fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub(crate) const fn generation(&self) -> Generation {
        self.generation
    }

    pub(crate) const fn has_subscription(&self) -> bool {
        self.active.is_some()
    }

    pub(crate) const fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
