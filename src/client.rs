//! The backend client boundary.
//!
//! Live queries, caching and transport belong to an external backend client. This
//! module describes the capability the adapter consumes from it as the
//! [`BackendClient`] trait: subscribe to a query with arguments and receive
//! deliveries through a listener, look up a locally cached result, and call
//! mutations and actions.
//!
//! Two implementations ship with the crate:
//!
//! - [`stream::StreamClient`] adapts any backend that produces a stream of results
//!   per subscription, running each subscription as a cancellable Tokio task.
//! - [`mock::MockClient`] is a controllable in-memory client for tests.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

pub mod mock;
pub mod stream;

/// Error type for backend operations.
///
/// Query errors are stored in query state and handed out on every read, so this
/// type is cheap to clone and comparable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The backend function failed. `data` carries an application-level payload
    /// when the function threw a structured error.
    #[error("Server error: {message}")]
    Server {
        message: String,
        data: Option<Value>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Failed to decode result: {0}")]
    Decode(String),
}

impl ClientError {
    /// Creates a [`ClientError::Server`] without a payload.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            data: None,
        }
    }
}

/// A reference to a backend function, such as `"messages:list"`.
///
/// The part before the last `:` is the module path, the part after it the exported
/// function name. A path without `:` refers to the module's `default` export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    path: String,
}

impl FunctionRef {
    /// Creates a reference from a function path.
    ///
    /// # Example
    ///
    /// ```
    /// use live_query::client::FunctionRef;
    ///
    /// let list = FunctionRef::new("chat/messages:list");
    /// assert_eq!(list.module(), "chat/messages");
    /// assert_eq!(list.name(), "list");
    ///
    /// let default = FunctionRef::new("users");
    /// assert_eq!(default.name(), "default");
    /// ```
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The module path.
    #[must_use]
    pub fn module(&self) -> &str {
        self.path
            .rsplit_once(':')
            .map_or(self.path.as_str(), |(module, _)| module)
    }

    /// The exported function name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit_once(':').map_or("default", |(_, name)| name)
    }

    /// The full path as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for FunctionRef {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// A single message from a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A new result for the subscribed query.
    Update(Value),
    /// The query failed.
    Error(ClientError),
}

/// Callback invoked for every delivery of one subscription.
///
/// Listeners may be called from any thread, including synchronously from inside
/// [`BackendClient::subscribe`].
pub type Listener = Arc<dyn Fn(Delivery) + Send + Sync>;

/// Ownership handle for one live subscription.
pub trait SubscriptionHandle: Send {
    /// Releases the subscription. The listener receives no further deliveries that
    /// the client has not already started dispatching.
    fn unsubscribe(self: Box<Self>);
}

/// The capability a live query needs from a backend client.
///
/// A single client is typically created once per process and shared by every
/// query as `Arc<C>`.
pub trait BackendClient: Send + Sync + 'static {
    /// Starts a live subscription for `query` with `args`.
    ///
    /// Results and failures are reported to `listener` until the returned handle is
    /// released.
    fn subscribe(
        &self,
        query: &FunctionRef,
        args: &Value,
        listener: Listener,
    ) -> Box<dyn SubscriptionHandle>;

    /// Returns a result the client already holds for `query` with `args`, if any.
    ///
    /// This is called while the adapter updates its state and must not invoke
    /// listeners.
    fn local_result(&self, _query: &FunctionRef, _args: &Value) -> Option<Value> {
        None
    }

    /// Runs a mutation.
    fn mutation(
        &self,
        function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>>;

    /// Runs an action.
    fn action(
        &self,
        function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>>;
}
