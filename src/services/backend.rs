//! Backend contract consumed by the session engine.
//!
//! Every call returns a uniform [`Result`]. Long-running listings and searches
//! report increments through [`EventStream`]s keyed by the id returned from the
//! start call; the engine drains them on its own turn via `poll()`.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Immutable snapshot of one filesystem entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    /// Absolute path, unique within a listing
    pub path: String,
    pub kind: EntryKind,
    /// Always 0 for directories
    pub size: u64,
    pub modified: DateTime<Local>,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SearchId(pub u64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listing#{}", self.0)
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search#{}", self.0)
    }
}

/// Response to `list_directory`. A present `listing_id` means more batches
/// follow on the listing's event stream.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub path: String,
    pub entries: Vec<Entry>,
    pub listing_id: Option<ListingId>,
}

/// One streamed increment of a directory listing
#[derive(Debug, Clone)]
pub struct ListingBatch {
    pub listing_id: ListingId,
    pub path: String,
    pub entries: Vec<Entry>,
    pub done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    /// Quick-open: fuzzy match on file and folder names
    Filename,
    /// Line matches inside text files
    Content,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    /// Treat the query as a regular expression (content search only)
    pub regex: bool,
    pub include_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub kind: SearchKind,
    pub query: String,
    pub root: String,
    pub limit: usize,
    pub options: SearchOptions,
}

/// A single match within a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMatch {
    pub line_number: u64,
    pub column: u64,
    pub line_content: String,
    pub match_start: usize,
    pub match_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub path: String,
    pub relative_path: String,
    pub kind: EntryKind,
    pub score: u32,
    /// Empty for filename search
    pub matches: Vec<ContentMatch>,
}

/// One streamed increment of a search
#[derive(Debug, Clone)]
pub struct SearchBatch {
    pub search_id: SearchId,
    pub results: Vec<SearchResult>,
    pub scanned_count: usize,
    pub done: bool,
}

/// Subscription handle for a batch stream. Dropping it detaches the
/// subscription; the producer sees a closed channel and may stop early.
#[derive(Debug)]
pub struct EventStream<T> {
    receiver: Receiver<T>,
    closed: bool,
}

impl<T> EventStream<T> {
    pub fn new(receiver: Receiver<T>) -> Self {
        Self { receiver, closed: false }
    }

    /// A stream that will never yield anything.
    pub fn empty() -> Self {
        let (_tx, rx) = mpsc::channel();
        Self { receiver: rx, closed: true }
    }

    /// Take everything currently buffered without blocking.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        out
    }

    /// True once the producer hung up and the buffer is exhausted.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// How long an opened stream may wait for its subscriber before it is evicted
pub const UNCLAIMED_TTL: Duration = Duration::from_secs(30);

/// Per-id channel registry for backend implementations.
///
/// `open` is called before the producer starts so nothing emitted before the
/// engine subscribes is lost; `subscribe` hands the buffered receiver out once.
/// Receivers nobody claims within [`UNCLAIMED_TTL`] are dropped on the next
/// `open`, which disconnects their producers.
#[derive(Debug)]
pub struct EventHub<T> {
    pending: Mutex<HashMap<u64, (Receiver<T>, Instant)>>,
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> EventHub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, id: u64) -> Sender<T> {
        let now = Instant::now();
        self.prune(now);
        let (tx, rx) = mpsc::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, (rx, now));
        }
        tx
    }

    pub fn subscribe(&self, id: u64) -> EventStream<T> {
        let receiver = self.pending.lock().ok().and_then(|mut p| p.remove(&id));
        match receiver {
            Some((rx, _)) => EventStream::new(rx),
            None => EventStream::empty(),
        }
    }

    /// Drop receivers opened more than [`UNCLAIMED_TTL`] before `now`.
    pub fn prune(&self, now: Instant) {
        if let Ok(mut pending) = self.pending.lock() {
            let before = pending.len();
            pending.retain(|_, (_, opened)| {
                now.saturating_duration_since(*opened) <= UNCLAIMED_TTL
            });
            let evicted = before - pending.len();
            if evicted > 0 {
                tracing::debug!(event = "hub.pruned", evicted);
            }
        }
    }

    /// Number of opened streams still waiting for a subscriber.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Forget an unclaimed stream (cancelled before subscription).
    pub fn discard(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

/// Filesystem service the engine talks to. Implementations may be local or
/// remote; no panics or exceptions cross this boundary.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_directory(&self, path: &str) -> Result<DirectoryListing>;

    fn subscribe_listing(&self, listing_id: ListingId) -> EventStream<ListingBatch>;

    /// Best-effort; must be idempotent.
    async fn cancel_listing(&self, listing_id: ListingId);

    async fn create_directory(&self, parent_path: &str, name: &str) -> Result<Entry>;

    async fn rename(&self, path: &str, new_name: &str) -> Result<Entry>;

    async fn copy(&self, source_path: &str, dest_dir: &str) -> Result<Entry>;

    async fn move_entry(&self, source_path: &str, dest_dir: &str) -> Result<Entry>;

    /// Permanent removal of a single entry.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Send every path to the platform trash. Fails without trashing
    /// anything when one of the paths does not exist.
    async fn move_to_trash(&self, paths: &[String]) -> Result<()>;

    async fn start_search(&self, request: &SearchRequest) -> Result<SearchId>;

    fn subscribe_search(&self, search_id: SearchId) -> EventStream<SearchBatch>;

    /// Best-effort; must be idempotent.
    async fn cancel_search(&self, search_id: SearchId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_buffers_until_subscribed() {
        let hub: EventHub<u32> = EventHub::new();
        let tx = hub.open(7);
        tx.send(1).unwrap();
        tx.send(2).unwrap();

        let mut stream = hub.subscribe(7);
        assert_eq!(stream.drain(), vec![1, 2]);
        assert!(!stream.is_closed());

        drop(tx);
        assert!(stream.drain().is_empty());
        assert!(stream.is_closed());
    }

    #[test]
    fn test_hub_subscribe_unknown_is_empty() {
        let hub: EventHub<u32> = EventHub::new();
        let mut stream = hub.subscribe(99);
        assert!(stream.drain().is_empty());
        assert!(stream.is_closed());
    }

    #[test]
    fn test_dropped_stream_disconnects_producer() {
        let hub: EventHub<u32> = EventHub::new();
        let tx = hub.open(1);
        let stream = hub.subscribe(1);
        drop(stream);
        assert!(tx.send(5).is_err());
    }

    #[test]
    fn test_hub_evicts_unclaimed_streams() {
        let hub: EventHub<u32> = EventHub::new();
        let stale = hub.open(1);
        let now = Instant::now();

        hub.prune(now);
        assert_eq!(hub.pending_len(), 1);
        assert!(stale.send(1).is_ok());

        hub.prune(now + UNCLAIMED_TTL + Duration::from_secs(1));
        assert_eq!(hub.pending_len(), 0);
        assert!(stale.send(2).is_err());
        assert!(hub.subscribe(1).drain().is_empty());
    }

    #[test]
    fn test_hub_discard_disconnects_producer() {
        let hub: EventHub<u32> = EventHub::new();
        let tx = hub.open(3);
        hub.discard(3);
        assert_eq!(hub.pending_len(), 0);
        assert!(tx.send(1).is_err());
    }

    #[test]
    fn test_entry_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EntryKind::Directory).unwrap(), "\"directory\"");
    }
}
