//! One cancellable, possibly multi-batch directory read per session.
//!
//! `load` issues the request and keeps the inline entries; when the backend
//! hands back a listing id the remaining batches are drained by `poll` on the
//! caller's turn. Batches are only merged while both their id and their path
//! match the listing in flight.

use std::sync::Arc;

use crate::error::Result;
use crate::services::backend::{Backend, Entry, EventStream, ListingBatch, ListingId};
use crate::utils::path::same_path;

struct ActiveListing {
    id: ListingId,
    stream: EventStream<ListingBatch>,
}

pub struct DirectoryStreamCoordinator {
    backend: Arc<dyn Backend>,
    active: Option<ActiveListing>,
    /// Path of the entries currently held
    path: Option<String>,
    entries: Vec<Entry>,
    loading: bool,
    done: bool,
    error: Option<String>,
    generation: u64,
}

impl DirectoryStreamCoordinator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            active: None,
            path: None,
            entries: Vec::new(),
            loading: false,
            done: false,
            error: None,
            generation: 0,
        }
    }

    /// Start reading `path`, cancelling whatever was in flight.
    ///
    /// On failure the error is recorded and the previously held entries stay
    /// in place.
    pub async fn load(&mut self, path: &str) -> Result<()> {
        self.cancel().await;

        self.generation += 1;
        let generation = self.generation;
        self.loading = true;
        self.done = false;
        self.error = None;
        tracing::debug!(event = "listing.requested", generation, path);

        let listing = match self.backend.list_directory(path).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(event = "listing.failed", generation, path, error = %e);
                self.error = Some(e.to_string());
                self.loading = false;
                return Err(e);
            }
        };

        self.path = Some(path.to_string());
        self.entries = listing.entries;

        match listing.listing_id {
            Some(id) => {
                tracing::debug!(
                    event = "listing.streaming",
                    generation,
                    listing_id = %id,
                    inline = self.entries.len()
                );
                let stream = self.backend.subscribe_listing(id);
                self.active = Some(ActiveListing { id, stream });
            }
            None => {
                tracing::debug!(
                    event = "listing.completed",
                    generation,
                    entries = self.entries.len()
                );
                self.loading = false;
                self.done = true;
            }
        }
        Ok(())
    }

    /// Merge every batch that arrived since the last call. Returns the number
    /// of entries appended.
    pub fn poll(&mut self) -> usize {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        let id = active.id;
        let batches = active.stream.drain();
        let closed = active.stream.is_closed();

        let mut appended = 0;
        let mut finished = false;
        for batch in batches {
            let path_matches = self
                .path
                .as_deref()
                .is_some_and(|p| same_path(p, &batch.path));
            if batch.listing_id != id || !path_matches {
                tracing::trace!(
                    event = "listing.dropped_stale_batch",
                    listing_id = %batch.listing_id,
                    active_id = %id,
                    path = %batch.path,
                    entries = batch.entries.len()
                );
                continue;
            }
            tracing::trace!(
                event = "listing.batch",
                listing_id = %id,
                entries = batch.entries.len(),
                done = batch.done
            );
            appended += batch.entries.len();
            self.entries.extend(batch.entries);
            finished |= batch.done;
        }

        if finished || closed {
            tracing::debug!(
                event = "listing.completed",
                listing_id = %id,
                entries = self.entries.len(),
                closed_early = !finished
            );
            self.active = None;
            self.loading = false;
            self.done = true;
        }
        appended
    }

    /// Stop the listing in flight, if any. Entries received so far are kept.
    pub async fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(event = "listing.cancelled", listing_id = %active.id);
            drop(active.stream);
            self.backend.cancel_listing(active.id).await;
        }
        self.loading = false;
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn listing_id(&self) -> Option<ListingId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
