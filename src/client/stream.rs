//! Stream-backed client.
//!
//! Many backends expose a live query as an async stream of results. [`StreamClient`]
//! turns such a backend into a [`BackendClient`]: every subscription becomes a Tokio
//! task that forwards stream items to the listener until the stream ends or the
//! subscription is released.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Backend { /* connection */ }
//!
//! impl StreamBackend for Backend {
//!     fn watch(&self, query: &FunctionRef, args: &Value) -> QueryStream {
//!         self.connection.subscribe(query.as_str(), args.clone()).boxed()
//!     }
//!     // mutation / action forward to the connection
//! }
//!
//! let client = Arc::new(StreamClient::new(Backend::connect(url).await?));
//! ```

use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{BackendClient, ClientError, Delivery, FunctionRef, Listener, SubscriptionHandle};

/// The results of one live query, in delivery order.
pub type QueryStream = BoxStream<'static, Result<Value, ClientError>>;

/// A backend that exposes live queries as streams.
pub trait StreamBackend: Send + Sync + 'static {
    /// Opens a stream of results for `query` with `args`.
    ///
    /// Dropping the stream must end the backend subscription.
    fn watch(&self, query: &FunctionRef, args: &Value) -> QueryStream;

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

/// A [`BackendClient`] over a [`StreamBackend`].
#[derive(Debug)]
pub struct StreamClient<B> {
    backend: Arc<B>,
    runtime: Handle,
}

impl<B: StreamBackend> StreamClient<B> {
    /// Creates a client that spawns subscription tasks on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_runtime(backend, Handle::current())
    }

    /// Creates a client that spawns subscription tasks on `runtime`.
    #[must_use]
    pub fn with_runtime(backend: B, runtime: Handle) -> Self {
        Self {
            backend: Arc::new(backend),
            runtime,
        }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Starts a subscription task and returns its concrete handle.
    ///
    /// This is what [`BackendClient::subscribe`] does, except that the caller keeps
    /// a [`TaskHandle`] and can await the task's shutdown with
    /// [`TaskHandle::cancel`].
    pub fn subscribe_task(
        &self,
        query: &FunctionRef,
        args: &Value,
        listener: Listener,
    ) -> TaskHandle {
        let mut stream = self.backend.watch(query, args);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let function = query.clone();

        let join = self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(value)) => listener(Delivery::Update(value)),
                        Some(Err(error)) => listener(Delivery::Error(error)),
                        None => break,
                    },
                }
            }
            trace!(%function, "subscription task finished");
        });

        TaskHandle::new(token, join)
    }
}

impl<B: StreamBackend> BackendClient for StreamClient<B> {
    fn subscribe(
        &self,
        query: &FunctionRef,
        args: &Value,
        listener: Listener,
    ) -> Box<dyn SubscriptionHandle> {
        Box::new(self.subscribe_task(query, args, listener))
    }

    fn mutation(
        &self,
        function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        self.backend.mutation(function, args)
    }

    fn action(
        &self,
        function: &FunctionRef,
        args: Value,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        self.backend.action(function, args)
    }
}

/// Handle for a running subscription task.
///
/// Releasing or dropping the handle cancels the task; the task observes the
/// cancellation at its next poll.
pub struct TaskHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    const fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Cancels the subscription and waits for the task to finish.
    ///
    /// Once this returns, the listener has been dropped and receives nothing more.
    pub async fn cancel(mut self) {
        self.token.cancel();
        let _ = (&mut self.join).await;
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl SubscriptionHandle for TaskHandle {
    fn unsubscribe(self: Box<Self>) {
        self.token.cancel();
    }
}
