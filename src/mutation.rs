//! Mutations and actions.
//!
//! Unlike queries, mutations and actions are one-off calls with a clear start and
//! end. They go straight to the client: arguments are serialized, the call is
//! forwarded unchanged, and the result is decoded into the caller's type. There is
//! no retry, queueing or ordering on top of what the client does.
//!
//! # Example
//!
//! ```rust,ignore
//! use live_query::mutation;
//!
//! let id: String = mutation::mutation(&*client, &FunctionRef::new("messages:send"), &NewMessage {
//!     channel: "general".to_string(),
//!     body: "hello".to_string(),
//! })
//! .await?;
//! ```

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::{BackendClient, ClientError, FunctionRef};

/// Runs the mutation `function` with `args`.
///
/// # Errors
///
/// The returned future resolves to [`ClientError::InvalidArgs`] if `args` do not
/// serialize (the client is not called), to the client's error if the mutation
/// fails, and to [`ClientError::Decode`] if the result is not a `T`.
pub fn mutation<T, C>(
    client: &C,
    function: &FunctionRef,
    args: &impl Serialize,
) -> BoxFuture<'static, Result<T, ClientError>>
where
    T: DeserializeOwned + Send + 'static,
    C: BackendClient + ?Sized,
{
    call(args, |args| client.mutation(function, args))
}

/// Runs the action `function` with `args`.
///
/// # Errors
///
/// Same as [`mutation`].
pub fn action<T, C>(
    client: &C,
    function: &FunctionRef,
    args: &impl Serialize,
) -> BoxFuture<'static, Result<T, ClientError>>
where
    T: DeserializeOwned + Send + 'static,
    C: BackendClient + ?Sized,
{
    call(args, |args| client.action(function, args))
}

fn call<T>(
    args: &impl Serialize,
    send: impl FnOnce(Value) -> BoxFuture<'static, Result<Value, ClientError>>,
) -> BoxFuture<'static, Result<T, ClientError>>
where
    T: DeserializeOwned + Send + 'static,
{
    match serde_json::to_value(args) {
        Ok(args) => {
            let pending = send(args);
            async move {
                let value = pending.await?;
                serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
            }
            .boxed()
        }
        Err(e) => future::ready(Err(ClientError::InvalidArgs(e.to_string()))).boxed(),
    }
}
