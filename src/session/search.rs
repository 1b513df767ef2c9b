//! Debounced, streamed search for one search surface (quick-open or content
//! search).
//!
//! Typing only arms a deadline; the search itself starts from `poll` once the
//! deadline passes, so a burst of keystrokes results in a single backend
//! request. Results are deduplicated by path as batches stream in and are
//! laid out as variable-height rows for virtualized rendering.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SearchSettings;
use crate::services::backend::{
    Backend, EventStream, SearchBatch, SearchId, SearchKind, SearchOptions, SearchRequest,
    SearchResult,
};
use crate::session::viewport::RowOffsets;

/// Rendered heights used for the virtualized result list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMetrics {
    /// Filename result row
    pub item_height: f32,
    /// File header above content matches
    pub header_height: f32,
    /// One content match line
    pub match_height: f32,
}

impl Default for RowMetrics {
    fn default() -> Self {
        Self {
            item_height: 28.0,
            header_height: 24.0,
            match_height: 20.0,
        }
    }
}

struct ActiveSearch {
    id: SearchId,
    stream: EventStream<SearchBatch>,
}

pub struct SearchStreamCoordinator {
    backend: Arc<dyn Backend>,
    kind: SearchKind,
    root: String,
    limit: usize,
    options: SearchOptions,
    debounce: Duration,
    query: String,
    deadline: Option<Instant>,
    active: Option<ActiveSearch>,
    results: Vec<SearchResult>,
    seen: HashSet<String>,
    scanned_count: usize,
    searching: bool,
    done: bool,
    error: Option<String>,
    selected: usize,
    rows: RowOffsets,
    metrics: RowMetrics,
}

impl SearchStreamCoordinator {
    pub fn new(backend: Arc<dyn Backend>, kind: SearchKind, settings: &SearchSettings) -> Self {
        let limit = match kind {
            SearchKind::Filename => settings.filename_limit,
            SearchKind::Content => settings.content_limit,
        };
        Self {
            backend,
            kind,
            root: String::new(),
            limit,
            options: SearchOptions::default(),
            debounce: Duration::from_millis(settings.debounce_ms),
            query: String::new(),
            deadline: None,
            active: None,
            results: Vec::new(),
            seen: HashSet::new(),
            scanned_count: 0,
            searching: false,
            done: false,
            error: None,
            selected: 0,
            rows: RowOffsets::new(),
            metrics: RowMetrics::default(),
        }
    }

    pub fn set_root(&mut self, root: &str) {
        self.root = root.to_string();
    }

    pub fn set_options(&mut self, options: SearchOptions) {
        self.options = options;
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn set_row_metrics(&mut self, metrics: RowMetrics) {
        self.metrics = metrics;
        self.rows = RowOffsets::new();
        for result in &self.results {
            self.rows.push(Self::row_height(self.kind, &metrics, result));
        }
    }

    /// Record a new query. A blank query cancels the running search and clears
    /// results at once; anything else (re)arms the debounce deadline.
    pub async fn set_query(&mut self, query: &str, now: Instant) {
        self.query = query.to_string();
        if query.trim().is_empty() {
            self.deadline = None;
            self.cancel().await;
            self.clear_results();
            self.error = None;
            return;
        }
        self.deadline = Some(now + self.debounce);
    }

    /// Start the pending search if its deadline has passed, then merge any
    /// batches that arrived. Returns the number of new results.
    pub async fn poll(&mut self, now: Instant) -> usize {
        if self.deadline.is_some_and(|d| now >= d) {
            self.deadline = None;
            self.start().await;
        }
        self.drain()
    }

    /// Start a pending query immediately, skipping the rest of the debounce.
    pub async fn flush(&mut self) -> usize {
        if self.deadline.take().is_some() {
            self.start().await;
        }
        self.drain()
    }

    pub async fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(event = "search.cancelled", search_id = %active.id);
            drop(active.stream);
            self.backend.cancel_search(active.id).await;
        }
        self.searching = false;
    }

    async fn start(&mut self) {
        self.cancel().await;
        self.clear_results();
        self.error = None;

        let request = SearchRequest {
            kind: self.kind,
            query: self.query.trim().to_string(),
            root: self.root.clone(),
            limit: self.limit,
            options: self.options.clone(),
        };
        tracing::debug!(
            event = "search.requested",
            kind = ?request.kind,
            query = %request.query,
            root = %request.root
        );

        self.searching = true;
        match self.backend.start_search(&request).await {
            Ok(id) => {
                let stream = self.backend.subscribe_search(id);
                self.active = Some(ActiveSearch { id, stream });
            }
            Err(e) => {
                tracing::warn!(event = "search.failed", query = %request.query, error = %e);
                self.error = Some(e.to_string());
                self.searching = false;
            }
        }
    }

    fn drain(&mut self) -> usize {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        let id = active.id;
        let batches = active.stream.drain();
        let closed = active.stream.is_closed();

        let mut added = 0;
        let mut finished = false;
        for batch in batches {
            if batch.search_id != id {
                tracing::trace!(
                    event = "search.dropped_stale_batch",
                    search_id = %batch.search_id,
                    active_id = %id,
                    results = batch.results.len()
                );
                continue;
            }
            for result in batch.results {
                if self.seen.insert(result.path.clone()) {
                    self.rows.push(Self::row_height(self.kind, &self.metrics, &result));
                    self.results.push(result);
                    added += 1;
                }
            }
            self.scanned_count = batch.scanned_count;
            finished |= batch.done;
        }

        if finished || closed {
            tracing::debug!(
                event = "search.completed",
                search_id = %id,
                results = self.results.len(),
                scanned = self.scanned_count
            );
            self.active = None;
            self.searching = false;
            self.done = true;
        }
        added
    }

    fn row_height(kind: SearchKind, metrics: &RowMetrics, result: &SearchResult) -> f32 {
        match kind {
            SearchKind::Filename => metrics.item_height,
            SearchKind::Content => {
                metrics.header_height + metrics.match_height * result.matches.len() as f32
            }
        }
    }

    fn clear_results(&mut self) {
        self.results.clear();
        self.seen.clear();
        self.rows.clear();
        self.scanned_count = 0;
        self.selected = 0;
        self.done = false;
    }

    pub fn select_next(&mut self) {
        if let Some(current) = self.selected() {
            self.selected = (current + 1).min(self.results.len() - 1);
        }
    }

    pub fn select_prev(&mut self) {
        if let Some(current) = self.selected() {
            self.selected = current.saturating_sub(1);
        }
    }

    pub fn set_selected(&mut self, index: usize) {
        self.selected = index;
    }

    /// Selected result index, clamped to the current result count.
    pub fn selected(&self) -> Option<usize> {
        if self.results.is_empty() {
            None
        } else {
            Some(self.selected.min(self.results.len() - 1))
        }
    }

    pub fn selected_result(&self) -> Option<&SearchResult> {
        self.selected().and_then(|i| self.results.get(i))
    }

    /// Result indices to render for the given scroll window.
    pub fn visible_range(
        &self,
        scroll_top: f32,
        viewport_height: f32,
        overscan: usize,
    ) -> Range<usize> {
        self.rows.visible_range(scroll_top, viewport_height, overscan)
    }

    pub fn row_top(&self, index: usize) -> Option<f32> {
        self.rows.top_of(index)
    }

    pub fn total_height(&self) -> f32 {
        self.rows.total_height()
    }

    pub fn kind(&self) -> SearchKind {
        self.kind
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn scanned_count(&self) -> usize {
        self.scanned_count
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// A query is waiting for its debounce deadline.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn active_id(&self) -> Option<SearchId> {
        self.active.as_ref().map(|a| a.id)
    }
}
