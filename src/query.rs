//! Live queries bound to a host scope.
//!
//! [`use_query`] creates a [`Query`] handle whose `data`, `is_loading` and `error`
//! follow a live subscription on the backend. The handle manages the subscription
//! itself:
//!
//! 1. Every time the host re-evaluates the scope, the argument function runs again
//! 2. If the resolved arguments differ (by deep equality) from the subscribed ones,
//!    the old subscription is released and, unless the arguments are
//!    [`QueryArgs::Skip`], a new one is created
//! 3. Deliveries for superseded arguments are discarded
//! 4. When the scope is destroyed, the subscription is released
//!
//! # State per arguments
//!
//! | Situation | `is_loading` | `data` | `error` |
//! |---|---|---|---|
//! | Skipped | `false` | `None` | `None` |
//! | Loading | `true` | `None` | `None` |
//! | Client holds a local result | `false` | local result | `None` |
//! | Seeded (`initial_data`, first arguments) | `false` | seed | `None` |
//! | Retained (`keep_previous_data`) | `false` | previous data | `None` |
//! | Resolved | `false` | value | `None` |
//! | Failed | `false` | previous data if retained, else `None` | error |
//!
//! # Example
//!
//! ```
//! use live_query::prelude::*;
//! use live_query::client::mock::MockClient;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let scope = Scope::new();
//! let client = Arc::new(MockClient::new());
//! let channel = Signal::new(&scope, Some("general".to_string()));
//!
//! let list = FunctionRef::new("messages:list");
//! let args = channel.clone();
//! let messages = use_query::<Vec<String>, _, _>(&scope, &client, list.clone(), move || {
//!     QueryArgs::from(args.get().map(|channel| json!({ "channel": channel })))
//! })
//! .unwrap();
//! assert!(messages.is_loading());
//!
//! client.emit(&list, &json!({"channel": "general"}), json!(["hi"]));
//! assert_eq!(messages.data(), Some(vec!["hi".to_string()]));
//!
//! channel.set(None);
//! scope.flush();
//! assert_eq!(messages.data(), None);
//! assert_eq!(client.live_count(), 0);
//! ```
//!
//! # Call-site stability
//!
//! Create each query once, unconditionally, for its logical slot and express
//! conditions through `Skip`. Creating queries from inside effects that are
//! themselves re-created, or during teardown, is not supported; hosts reject
//! creation during teardown with [`HostError`].

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::args::QueryArgs;
use crate::client::{BackendClient, ClientError, Delivery, FunctionRef, Listener};
use crate::host::{Host, HostError, Notifier};

mod options;
mod state;

pub use options::QueryOptions;

use state::{Generation, SubscriptionState, Transition};

/// A snapshot of a query's reactive fields.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    /// The latest data, if any.
    pub data: Option<T>,
    /// The latest error, if any.
    pub error: Option<ClientError>,
    /// Whether a result for the current arguments is still outstanding.
    pub is_loading: bool,
}

/// Coarse classification of a [`QueryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Not loading and nothing to show; the query is skipped.
    Idle,
    /// Waiting for the first result for the current arguments.
    Loading,
    /// Data is available and no error is set.
    Success,
    /// The latest delivery for the current arguments was an error.
    Error,
}

impl<T> QueryResult<T> {
    /// Returns the data if present.
    pub const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Returns the status of this result. An error wins over retained data.
    pub const fn status(&self) -> QueryStatus {
        if self.error.is_some() {
            QueryStatus::Error
        } else if self.is_loading {
            QueryStatus::Loading
        } else if self.data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        }
    }

    /// Returns `true` if the query currently has data and no error.
    pub const fn is_success(&self) -> bool {
        matches!(self.status(), QueryStatus::Success)
    }

    /// Returns `true` if the query failed.
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A live query handle.
///
/// Reads always reflect the latest state; the host is notified whenever that state
/// changes. Cloning the handle shares the state. Dropping handles does not end the
/// subscription: it lives as long as the scope the query was created in.
pub struct Query<T> {
    function: FunctionRef,
    state: Arc<Mutex<SubscriptionState<T>>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            function: self.function.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone> Query<T> {
    /// The latest data, if any.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.state.lock().data().cloned()
    }

    /// Whether a result for the current arguments is still outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading()
    }

    /// The latest error, if any.
    #[must_use]
    pub fn error(&self) -> Option<ClientError> {
        self.state.lock().error().cloned()
    }

    /// All reactive fields, read atomically.
    #[must_use]
    pub fn result(&self) -> QueryResult<T> {
        self.state.lock().snapshot()
    }

    /// The query function this handle is subscribed to.
    #[must_use]
    pub const fn function(&self) -> &FunctionRef {
        &self.function
    }

    /// Number of argument changes seen so far (plus one after teardown).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation()
    }

    /// Returns `true` while a backend subscription is held.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state.lock().has_subscription()
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("function", &self.function)
            .field("result", &self.result())
            .finish()
    }
}

/// Creates a live query with default options.
///
/// See [`use_query_with`].
///
/// # Errors
///
/// Returns the host's error if the scope is tearing down or destroyed.
pub fn use_query<T, C, H>(
    host: &H,
    client: &Arc<C>,
    function: FunctionRef,
    args: impl Fn() -> QueryArgs + Send + 'static,
) -> Result<Query<T>, HostError>
where
    T: DeserializeOwned + Clone + Send + 'static,
    C: BackendClient + ?Sized,
    H: Host + ?Sized,
{
    use_query_with(host, client, function, args, QueryOptions::default)
}

/// Creates a live query for `function`.
///
/// `args` and `options` run once immediately and again on every re-evaluation of
/// the host scope. Delivered values are decoded into `T`; a value that does not
/// decode is reported as [`ClientError::Decode`].
///
/// # Errors
///
/// Returns the host's error if the scope is tearing down or destroyed. No
/// subscription is left behind in that case.
pub fn use_query_with<T, C, H>(
    host: &H,
    client: &Arc<C>,
    function: FunctionRef,
    args: impl Fn() -> QueryArgs + Send + 'static,
    options: impl Fn() -> QueryOptions<T> + Send + 'static,
) -> Result<Query<T>, HostError>
where
    T: DeserializeOwned + Clone + Send + 'static,
    C: BackendClient + ?Sized,
    H: Host + ?Sized,
{
    let state = Arc::new(Mutex::new(SubscriptionState::new()));

    let effect = {
        let state = Arc::clone(&state);
        let client = Arc::clone(client);
        let function = function.clone();
        let notifier = host.notifier();
        move || {
            let resolved = args();
            let options = options();
            evaluate(&state, &*client, &function, resolved, &options, &notifier);
        }
    };
    if let Err(e) = host.create_effect(Box::new(effect)) {
        teardown(&state, &function);
        return Err(e);
    }

    let cleanup = {
        let state = Arc::clone(&state);
        let function = function.clone();
        move || teardown(&state, &function)
    };
    if let Err(e) = host.on_cleanup(Box::new(cleanup)) {
        teardown(&state, &function);
        return Err(e);
    }

    Ok(Query { function, state })
}

fn evaluate<T, C>(
    state: &Arc<Mutex<SubscriptionState<T>>>,
    client: &C,
    function: &FunctionRef,
    args: QueryArgs,
    options: &QueryOptions<T>,
    notifier: &Notifier,
) where
    T: DeserializeOwned + Clone + Send + 'static,
    C: BackendClient + ?Sized,
{
    let changed = {
        let guard = state.lock();
        !guard.is_torn_down() && !guard.is_current(&args)
    };
    // The client may hold its own locks while delivering, so it is never called
    // with the state lock held. `advance` re-checks both conditions.
    let local = match &args {
        QueryArgs::Args(value) if changed => client
            .local_result(function, value)
            .and_then(|local| decode_local(function, local)),
        _ => None,
    };
    let transition = state.lock().advance(args, options, local);

    match transition {
        Transition::Unchanged => {
            trace!(%function, "query arguments unchanged");
            return;
        }
        Transition::TornDown => {
            trace!(%function, "ignoring re-evaluation after teardown");
            return;
        }
        Transition::Skipped { released } => {
            debug!(%function, "query skipped");
            if let Some(handle) = released {
                handle.unsubscribe();
            }
        }
        Transition::Subscribe {
            generation,
            args,
            released,
        } => {
            if let Some(handle) = released {
                handle.unsubscribe();
            }
            debug!(%function, generation, %args, "subscribing");

            let listener = listener(Arc::downgrade(state), generation, notifier.clone());
            let handle = client.subscribe(function, &args, listener);
            if let Some(orphan) = state.lock().attach(generation, handle) {
                debug!(%function, generation, "releasing subscription for superseded arguments");
                orphan.unsubscribe();
            }
        }
    }
    notifier.notify();
}

fn listener<T>(
    state: Weak<Mutex<SubscriptionState<T>>>,
    generation: Generation,
    notifier: Notifier,
) -> Listener
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    Arc::new(move |delivery: Delivery| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let outcome = match delivery {
            Delivery::Update(value) => {
                serde_json::from_value::<T>(value).map_err(|e| ClientError::Decode(e.to_string()))
            }
            Delivery::Error(error) => Err(error),
        };

        let applied = state.lock().deliver(generation, outcome);
        if applied {
            notifier.notify();
        } else {
            trace!(generation, "discarding delivery for superseded generation");
        }
    })
}

fn decode_local<T: DeserializeOwned>(function: &FunctionRef, value: serde_json::Value) -> Option<T> {
    serde_json::from_value(value)
        .inspect_err(|e| warn!(%function, error = %e, "ignoring undecodable local result"))
        .ok()
}

fn teardown<T: Clone>(state: &Mutex<SubscriptionState<T>>, function: &FunctionRef) {
    let released = state.lock().teardown();
    if let Some(handle) = released {
        debug!(%function, "releasing subscription on teardown");
        handle.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockClient;
    use crate::host::{Scope, Signal};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct User {
        name: String,
    }

    fn user_query() -> FunctionRef {
        FunctionRef::new("users:get")
    }

    fn by_id(id: &Signal<Option<u64>>) -> impl Fn() -> QueryArgs + Send + 'static {
        let id = id.clone();
        move || QueryArgs::from(id.get().map(|id| json!({ "id": id })))
    }

    #[test]
    fn test_query_result_status() {
        let mut result = QueryResult::<i32> {
            data: None,
            error: None,
            is_loading: false,
        };
        assert_eq!(result.status(), QueryStatus::Idle);

        result.is_loading = true;
        assert_eq!(result.status(), QueryStatus::Loading);

        result.is_loading = false;
        result.data = Some(1);
        assert_eq!(result.status(), QueryStatus::Success);
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&1));

        result.error = Some(ClientError::server("boom"));
        assert_eq!(result.status(), QueryStatus::Error);
        assert!(result.is_error());
        assert!(!result.is_success());
    }

    #[test]
    fn test_use_query_subscribes_immediately() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        let id = Signal::new(&scope, Some(1));

        let user = use_query::<User, _, _>(&scope, &client, user_query(), by_id(&id))
            .expect("scope is active");

        assert!(user.is_loading());
        assert!(user.is_subscribed());
        assert_eq!(user.function(), &user_query());
        assert_eq!(client.live_args(&user_query()), vec![json!({"id": 1})]);
    }

    #[test]
    fn test_delivery_notifies_host() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        let id = Signal::new(&scope, Some(1));
        let user = use_query::<User, _, _>(&scope, &client, user_query(), by_id(&id))
            .expect("scope is active");
        let before = scope.revision();

        client.emit(&user_query(), &json!({"id": 1}), json!({"name": "a"}));

        assert_eq!(user.data(), Some(User { name: "a".to_string() }));
        assert!(scope.revision() > before);
    }

    #[test]
    fn test_undecodable_delivery_is_an_error() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        let id = Signal::new(&scope, Some(1));
        let user = use_query::<User, _, _>(&scope, &client, user_query(), by_id(&id))
            .expect("scope is active");

        client.emit(&user_query(), &json!({"id": 1}), json!({"nickname": "a"}));

        assert!(!user.is_loading());
        assert!(user.data().is_none());
        assert!(matches!(user.error(), Some(ClientError::Decode(_))));
    }

    #[test]
    fn test_flush_without_change_keeps_subscription() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        let id = Signal::new(&scope, Some(1));
        let user = use_query::<User, _, _>(&scope, &client, user_query(), by_id(&id))
            .expect("scope is active");

        scope.flush();
        scope.flush();

        assert_eq!(client.subscribe_count(), 1);
        assert_eq!(user.generation(), 1);
    }

    #[test]
    fn test_local_result_avoids_loading() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        client.set_local_result(&user_query(), &json!({"id": 1}), json!({"name": "cached"}));
        let id = Signal::new(&scope, Some(1));

        let user = use_query::<User, _, _>(&scope, &client, user_query(), by_id(&id))
            .expect("scope is active");

        assert!(!user.is_loading());
        assert_eq!(user.data(), Some(User { name: "cached".to_string() }));
        assert!(user.is_subscribed());
    }

    #[test]
    fn test_undecodable_local_result_is_ignored() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        client.set_local_result(&user_query(), &json!({"id": 1}), json!(42));
        let id = Signal::new(&scope, Some(1));

        let user = use_query::<User, _, _>(&scope, &client, user_query(), by_id(&id))
            .expect("scope is active");

        assert!(user.is_loading());
        assert!(user.error().is_none());
    }

    #[test]
    fn test_create_after_destroy_leaves_no_subscription() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        let id = Signal::new(&scope, Some(1));
        scope.destroy();

        let result = use_query::<User, _, _>(&scope, &client, user_query(), by_id(&id));

        assert!(matches!(result, Err(HostError::Destroyed)));
        assert_eq!(client.subscribe_count(), 0);
    }

    #[test]
    fn test_create_during_teardown_is_rejected() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        let outcome = Arc::new(Mutex::new(None));

        let host = scope.clone();
        let inner_client = Arc::clone(&client);
        let slot = Arc::clone(&outcome);
        scope
            .on_cleanup(Box::new(move || {
                let result = use_query::<User, _, _>(&host, &inner_client, user_query(), || {
                    QueryArgs::from(json!({"id": 1}))
                });
                *slot.lock() = Some(result.err());
            }))
            .expect("scope is active");

        scope.destroy();

        assert_eq!(*outcome.lock(), Some(Some(HostError::CreateDuringTeardown)));
        assert_eq!(client.live_count(), 0);
    }

    #[test]
    fn test_options_are_reevaluated() {
        let scope = Scope::new();
        let client = Arc::new(MockClient::new());
        let id = Signal::new(&scope, Some(1));
        let keep = Signal::new(&scope, false);

        let keep_flag = keep.clone();
        let user = use_query_with::<User, _, _>(&scope, &client, user_query(), by_id(&id), move || {
            QueryOptions::new().keep_previous_data(keep_flag.get())
        })
        .expect("scope is active");
        client.emit(&user_query(), &json!({"id": 1}), json!({"name": "a"}));

        keep.set(true);
        id.set(Some(2));
        scope.flush();

        assert!(!user.is_loading());
        assert_eq!(user.data(), Some(User { name: "a".to_string() }));
    }
}
