//! Mock backend client for testing.
//!
//! [`MockClient`] keeps live subscriptions in memory and delivers values on demand,
//! enabling deterministic tests of query state without a real backend or timing
//! dependencies.
//!
//! # Basic Usage
//!
//! ```
//! use live_query::client::{BackendClient, Delivery, FunctionRef, SubscriptionHandle, mock::MockClient};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mock = MockClient::new();
//! let query = FunctionRef::new("users:get");
//!
//! let listener = Arc::new(|delivery: Delivery| println!("{delivery:?}"));
//! let handle = mock.subscribe(&query, &json!({"id": 1}), listener);
//! assert_eq!(mock.live_count(), 1);
//!
//! // Reaches every live subscription with deep-equal arguments
//! assert_eq!(mock.emit(&query, &json!({"id": 1}), json!({"name": "a"})), 1);
//!
//! handle.unsubscribe();
//! assert_eq!(mock.live_count(), 0);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::equality::deep_equal;

use super::{BackendClient, ClientError, Delivery, FunctionRef, Listener, SubscriptionHandle};

/// The kind of call recorded by [`MockClient::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Mutation,
    Action,
}

/// A mutation or action invocation seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub kind: CallKind,
    pub function: FunctionRef,
    pub args: Value,
}

struct MockSubscription {
    query: FunctionRef,
    args: Value,
    listener: Listener,
}

impl MockSubscription {
    fn matches(&self, query: &FunctionRef, args: &Value) -> bool {
        self.query == *query && deep_equal(&self.args, args)
    }
}

#[derive(Default)]
struct Inner {
    live: DashMap<u64, MockSubscription>,
    /// Kept until [`MockClient::clear_released`] so late deliveries can be replayed.
    released: DashMap<u64, MockSubscription>,
    next_id: AtomicU64,
    subscribed: AtomicUsize,
    local_results: Mutex<Vec<(FunctionRef, Value, Value)>>,
    mutation_responses: DashMap<FunctionRef, Result<Value, ClientError>>,
    action_responses: DashMap<FunctionRef, Result<Value, ClientError>>,
    calls: Mutex<Vec<MockCall>>,
}

/// A controllable in-memory backend client.
///
/// Cloning shares the underlying state, so a clone can be handed to the code under
/// test (usually as `Arc<MockClient>`) while the test drives deliveries.
#[derive(Clone, Default)]
pub struct MockClient {
    inner: Arc<Inner>,
}

impl MockClient {
    /// Creates a mock with no subscriptions and no canned responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `value` to every live subscription of `query` with deep-equal `args`.
    ///
    /// Returns the number of subscriptions reached.
    pub fn emit(&self, query: &FunctionRef, args: &Value, value: Value) -> usize {
        Self::deliver(&self.inner.live, query, args, &Delivery::Update(value))
    }

    /// Delivers `error` to every live subscription of `query` with deep-equal `args`.
    ///
    /// Returns the number of subscriptions reached.
    pub fn emit_error(&self, query: &FunctionRef, args: &Value, error: ClientError) -> usize {
        Self::deliver(&self.inner.live, query, args, &Delivery::Error(error))
    }

    /// Delivers to subscriptions that were already released.
    ///
    /// This simulates messages that were in flight when a subscription was dropped.
    /// Released subscriptions, and the listeners they hold, are kept until
    /// [`MockClient::clear_released`]. Returns the number of released subscriptions
    /// reached.
    pub fn emit_released(&self, query: &FunctionRef, args: &Value, delivery: Delivery) -> usize {
        Self::deliver(&self.inner.released, query, args, &delivery)
    }

    /// Forgets released subscriptions and drops their listeners.
    ///
    /// Returns how many were removed.
    pub fn clear_released(&self) -> usize {
        let count = self.inner.released.len();
        self.inner.released.clear();
        count
    }

    fn deliver(
        subscriptions: &DashMap<u64, MockSubscription>,
        query: &FunctionRef,
        args: &Value,
        delivery: &Delivery,
    ) -> usize {
        // Collect first: listeners may subscribe or unsubscribe, which needs the map.
        let listeners: Vec<Listener> = subscriptions
            .iter()
            .filter(|entry| entry.matches(query, args))
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in &listeners {
            listener(delivery.clone());
        }
        listeners.len()
    }

    /// Number of subscriptions currently live.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.live.len()
    }

    /// Arguments of every live subscription of `query`.
    #[must_use]
    pub fn live_args(&self, query: &FunctionRef) -> Vec<Value> {
        self.inner
            .live
            .iter()
            .filter(|entry| entry.query == *query)
            .map(|entry| entry.args.clone())
            .collect()
    }

    /// Total number of subscriptions ever created.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.inner.subscribed.load(Ordering::SeqCst)
    }

    /// Makes `value` available through [`BackendClient::local_result`].
    pub fn set_local_result(&self, query: &FunctionRef, args: &Value, value: Value) {
        let mut local_results = self.inner.local_results.lock();
        local_results.retain(|(q, a, _)| !(q == query && deep_equal(a, args)));
        local_results.push((query.clone(), args.clone(), value));
    }

    /// Sets the response returned by subsequent calls of mutation `function`.
    pub fn set_mutation_response(&self, function: &FunctionRef, response: Result<Value, ClientError>) {
        self.inner
            .mutation_responses
            .insert(function.clone(), response);
    }

    /// Sets the response returned by subsequent calls of action `function`.
    pub fn set_action_response(&self, function: &FunctionRef, response: Result<Value, ClientError>) {
        self.inner.action_responses.insert(function.clone(), response);
    }

    /// Mutation and action calls seen so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.calls.lock().clone()
    }

    fn call(
        &self,
        kind: CallKind,
        function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        let responses = match kind {
            CallKind::Mutation => &self.inner.mutation_responses,
            CallKind::Action => &self.inner.action_responses,
        };
        let response = responses.get(function).map_or_else(
            || Err(ClientError::server(format!("no mock response for {function}"))),
            |response| response.clone(),
        );

        self.inner.calls.lock().push(MockCall {
            kind,
            function: function.clone(),
            args,
        });
        future::ready(response).boxed()
    }
}

impl fmt::Debug for MockClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockClient")
            .field("live", &self.live_count())
            .field("released", &self.inner.released.len())
            .field("subscribed", &self.subscribe_count())
            .finish_non_exhaustive()
    }
}

impl BackendClient for MockClient {
    fn subscribe(
        &self,
        query: &FunctionRef,
        args: &Value,
        listener: Listener,
    ) -> Box<dyn SubscriptionHandle> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribed.fetch_add(1, Ordering::SeqCst);
        self.inner.live.insert(
            id,
            MockSubscription {
                query: query.clone(),
                args: args.clone(),
                listener,
            },
        );
        Box::new(MockHandle {
            id,
            inner: Arc::clone(&self.inner),
        })
    }

    fn local_result(&self, query: &FunctionRef, args: &Value) -> Option<Value> {
        self.inner
            .local_results
            .lock()
            .iter()
            .find(|(q, a, _)| q == query && deep_equal(a, args))
            .map(|(_, _, value)| value.clone())
    }

    fn mutation(
        &self,
        function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        self.call(CallKind::Mutation, function, args)
    }

    fn action(
        &self,
        function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        self.call(CallKind::Action, function, args)
    }
}

struct MockHandle {
    id: u64,
    inner: Arc<Inner>,
}

impl SubscriptionHandle for MockHandle {
    fn unsubscribe(self: Box<Self>) {
        if let Some((id, subscription)) = self.inner.live.remove(&self.id) {
            self.inner.released.insert(id, subscription);
        }
    }
}
