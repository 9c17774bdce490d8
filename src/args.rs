//! Resolved query arguments and the skip sentinel.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::ClientError;
use crate::equality::deep_equal;

/// The value produced by a query's argument function.
///
/// An argument function runs on every re-evaluation of its scope and returns either
/// the arguments to subscribe with, or [`QueryArgs::Skip`] to hold no subscription
/// at all. Skipping is how a query is activated conditionally: the adapter itself
/// is always created, only its arguments change.
///
/// # Example
///
/// ```
/// use live_query::args::QueryArgs;
/// use serde_json::json;
///
/// let user_id: Option<u64> = None;
/// let args = QueryArgs::from(user_id.map(|id| json!({ "id": id })));
/// assert!(args.is_skip());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArgs {
    /// Subscribe with these arguments.
    Args(Value),
    /// Do not subscribe.
    Skip,
}

impl QueryArgs {
    /// Serializes `args` into query arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgs`] if `args` cannot be represented as JSON.
    pub fn new(args: &impl Serialize) -> Result<Self, ClientError> {
        serde_json::to_value(args)
            .map(Self::from)
            .map_err(|e| ClientError::InvalidArgs(e.to_string()))
    }

    /// The skip sentinel.
    #[must_use]
    pub const fn skip() -> Self {
        Self::Skip
    }

    /// An empty arguments object, for queries that take no arguments.
    #[must_use]
    pub fn empty() -> Self {
        Self::Args(Value::Object(Map::new()))
    }

    /// Returns `true` for the skip sentinel.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Returns the arguments value, or `None` when skipped.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Args(value) => Some(value),
            Self::Skip => None,
        }
    }

    /// Returns `true` if both describe the same subscription.
    ///
    /// Arguments are compared with [`deep_equal`], so freshly allocated but equal
    /// values are considered the same.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Skip, Self::Skip) => true,
            (Self::Args(a), Self::Args(b)) => deep_equal(a, b),
            _ => false,
        }
    }
}

impl From<Value> for QueryArgs {
    /// `null` is treated as "no arguments" and becomes an empty object.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::empty(),
            value => Self::Args(value),
        }
    }
}

impl From<Option<Value>> for QueryArgs {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Skip, Self::from)
    }
}
