use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::remote::types::TreeNode;

/// Default delay between the last keystroke and the search request.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Outcome of editing the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryChange {
    /// The query is blank; results were dropped.
    Cleared,
    /// A request for this query should be issued after the debounce delay.
    Debounce(String),
}

/// Search box state and the result set that temporarily replaces the tree.
///
/// Search mode is active exactly while a result set is present. Only the
/// latest debounce timer is ever alive; a request already on the wire is not
/// cancelled, its answer is just dropped if the query moved on.
#[derive(Debug)]
pub struct SearchOverlay {
    query: String,
    results: Option<Vec<Arc<TreeNode>>>,
    searching: bool,
    debounce: Option<JoinHandle<()>>,
    pub delay: Duration,
}

impl Default for SearchOverlay {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl SearchOverlay {
    pub fn new(delay: Duration) -> Self {
        Self {
            query: String::new(),
            results: None,
            searching: false,
            debounce: None,
            delay,
        }
    }

    /// Text as typed.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> Option<&[Arc<TreeNode>]> {
        self.results.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.results.is_some()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Replace the query text. Any pending timer is cancelled.
    pub fn update_query(&mut self, value: &str) -> QueryChange {
        self.cancel_timer();
        self.query = value.to_string();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.results = None;
            self.searching = false;
            return QueryChange::Cleared;
        }
        QueryChange::Debounce(trimmed.to_string())
    }

    /// Keep `handle` as the one live debounce timer.
    pub fn arm(&mut self, handle: JoinHandle<()>) {
        self.cancel_timer();
        self.debounce = Some(handle);
    }

    /// Whether `query` is still what the user is searching for.
    pub fn is_current(&self, query: &str) -> bool {
        !query.is_empty() && self.query.trim() == query
    }

    /// The debounce timer for `query` fired and its request is going out.
    pub fn begin_request(&mut self) {
        self.debounce = None;
        self.searching = true;
    }

    /// Apply the answer for `query`.
    ///
    /// Returns `None` when the answer is stale and was dropped. A failure
    /// clears the result set but keeps the typed query.
    pub fn complete(
        &mut self,
        query: &str,
        result: Result<Vec<TreeNode>, AppError>,
    ) -> Option<Result<usize, AppError>> {
        if !self.is_current(query) {
            return None;
        }
        self.searching = false;
        match result {
            Ok(hits) => {
                let count = hits.len();
                self.results = Some(hits.into_iter().map(Arc::new).collect());
                Some(Ok(count))
            }
            Err(e) => {
                self.results = None;
                Some(Err(e))
            }
        }
    }

    /// Leave search mode and empty the box.
    pub fn clear(&mut self) {
        self.cancel_timer();
        self.query.clear();
        self.results = None;
        self.searching = false;
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

impl Drop for SearchOverlay {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
