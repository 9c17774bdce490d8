//! Prelude module for convenient imports.
//!
//! ```
//! use live_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`use_query`] / [`use_query_with`] - Create live queries
//! - [`Query`], [`QueryResult`], [`QueryOptions`] - Query handles and configuration
//! - [`QueryArgs`] - Resolved arguments or the skip sentinel
//! - [`BackendClient`], [`FunctionRef`], [`ClientError`] - The client boundary
//! - [`Host`], [`Scope`], [`Signal`] - The host boundary
//! - [`mutation`] / [`action`] - One-off calls

pub use crate::args::QueryArgs;
pub use crate::client::{BackendClient, ClientError, FunctionRef};
pub use crate::host::{Host, HostError, Scope, Signal};
pub use crate::mutation::{action, mutation};
pub use crate::query::{Query, QueryOptions, QueryResult, use_query, use_query_with};
