//! # live-query - reactive live queries for UI scopes
//!
//! live-query turns a backend client's live query subscriptions into reactive
//! values for UI code. A [`Query`](query::Query) handle exposes `data`,
//! `is_loading` and `error`, and manages its subscription on its own: it follows
//! the query arguments as they change, ignores results for outdated arguments, and
//! releases the subscription when its scope goes away.
//!
//! ## Architecture
//!
//! 1. **Host**: the UI framework scope the query lives in ([`host::Host`]). It
//!    re-evaluates queries and tears them down.
//! 2. **Client**: the external backend client ([`client::BackendClient`]). It owns
//!    the subscription protocol, caching and transport.
//! 3. **Query**: the adapter between the two ([`query::use_query`]).
//!
//! ## Core Components
//!
//! - [`use_query`](query::use_query) / [`use_query_with`](query::use_query_with):
//!   create a live query
//! - [`QueryArgs`](args::QueryArgs): resolved arguments or the skip sentinel
//! - [`QueryOptions`](query::QueryOptions): seed data and stale-data retention
//! - [`Scope`](host::Scope) and [`Signal`](host::Signal): a deterministic host and
//!   a reactive cell
//! - [`mutation`](mutation::mutation) / [`action`](mutation::action): one-off
//!   calls passed straight to the client
//! - [`StreamClient`](client::stream::StreamClient) and
//!   [`MockClient`](client::mock::MockClient): ready-made clients
//!
//! ## Example
//!
//! ```rust
//! use live_query::prelude::*;
//! use live_query::client::mock::MockClient;
//! use serde::Deserialize;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, PartialEq, Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! let scope = Scope::new();
//! let client = Arc::new(MockClient::new());
//! let user_id = Signal::new(&scope, Some(1));
//!
//! let get_user = FunctionRef::new("users:get");
//! let id = user_id.clone();
//! let user = use_query::<User, _, _>(&scope, &client, get_user.clone(), move || {
//!     QueryArgs::from(id.get().map(|id| json!({ "id": id })))
//! })
//! .unwrap();
//!
//! assert!(user.is_loading());
//!
//! client.emit(&get_user, &json!({"id": 1}), json!({"name": "Ada"}));
//! assert_eq!(user.data(), Some(User { name: "Ada".to_string() }));
//!
//! // Changing arguments starts over with a new subscription
//! user_id.set(Some(2));
//! scope.flush();
//! assert!(user.is_loading());
//! assert_eq!(client.live_args(&get_user), vec![json!({"id": 2})]);
//!
//! // Destroying the scope releases it
//! scope.destroy();
//! assert_eq!(client.live_count(), 0);
//! ```

pub mod args;
pub mod client;
pub mod equality;
pub mod host;
pub mod mutation;
pub mod prelude;
pub mod query;
