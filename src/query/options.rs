/// Per-query configuration.
///
/// Options are produced by the options function on every re-evaluation, together
/// with the arguments, so they may depend on reactive state.
///
/// # Example
///
/// ```
/// use live_query::query::QueryOptions;
///
/// let options = QueryOptions::default()
///     .with_initial_data(vec!["cached".to_string()])
///     .keep_previous_data(true);
/// assert!(options.keep_previous_data);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions<T> {
    /// Value reported while the first arguments are still loading.
    ///
    /// The seed only applies as long as the arguments never changed from the first
    /// resolved arguments.
    pub initial_data: Option<T>,

    /// Keep showing the last data while new arguments load, and alongside errors.
    pub keep_previous_data: bool,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            initial_data: None,
            keep_previous_data: false,
        }
    }
}

impl<T> QueryOptions<T> {
    /// Creates options with no seed and no retention.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_data: None,
            keep_previous_data: false,
        }
    }

    /// Seeds the first arguments with `data`.
    #[must_use]
    pub fn with_initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Enables or disables stale-data retention.
    #[must_use]
    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }
}
