use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::error::{EngineError, Result};
use crate::services::backend::{
    Backend, DirectoryListing, Entry, EntryKind, EventHub, EventStream, ListingBatch, ListingId,
    SearchBatch, SearchId, SearchRequest, SearchResult,
};
use crate::utils::path::{file_name, join, parent_of};

pub fn stamp(secs: u64) -> DateTime<Local> {
    DateTime::<Local>::from(UNIX_EPOCH + Duration::from_secs(secs))
}

pub fn file(dir: &str, name: &str, size: u64) -> Entry {
    Entry {
        name: name.to_string(),
        path: join(dir, name),
        kind: EntryKind::File,
        size,
        modified: stamp(1_700_000_000 + size),
    }
}

pub fn folder(dir: &str, name: &str) -> Entry {
    Entry {
        name: name.to_string(),
        path: join(dir, name),
        kind: EntryKind::Directory,
        size: 0,
        modified: stamp(1_700_000_000),
    }
}

pub fn hit(path: &str) -> SearchResult {
    SearchResult {
        name: file_name(path),
        path: path.to_string(),
        relative_path: path.trim_start_matches('/').to_string(),
        kind: EntryKind::File,
        score: 10,
        matches: Vec::new(),
    }
}

/// In-memory backend. Streamed paths answer with their first entry and a
/// listing id; tests push the remaining batches by hand.
#[derive(Default)]
pub struct ScriptedBackend {
    tree: Mutex<BTreeMap<String, Vec<Entry>>>,
    streamed: Mutex<HashSet<String>>,
    unreadable: Mutex<HashSet<String>>,
    failures: Mutex<HashMap<&'static str, EngineError>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
    listing_senders: Mutex<HashMap<u64, Sender<ListingBatch>>>,
    search_senders: Mutex<HashMap<u64, Sender<SearchBatch>>>,
    listings: EventHub<ListingBatch>,
    searches: EventHub<SearchBatch>,
    last_search: Mutex<Option<SearchRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.add_dir("/");
        backend
    }

    /// Register `path` (and every ancestor) as an existing directory.
    pub fn add_dir(&self, path: &str) {
        let mut tree = self.tree.lock().unwrap();
        let mut current = path.to_string();
        loop {
            tree.entry(current.clone()).or_default();
            let parent = parent_of(&current);
            if parent == current {
                break;
            }
            let name = file_name(&current);
            let siblings = tree.entry(parent.clone()).or_default();
            if !siblings.iter().any(|e| e.path == current) {
                siblings.push(folder(&parent, &name));
            }
            current = parent;
        }
    }

    /// Replace the contents of `dir` with `entries`.
    pub fn set_entries(&self, dir: &str, entries: Vec<Entry>) {
        self.add_dir(dir);
        let mut tree = self.tree.lock().unwrap();
        for entry in entries.iter().filter(|e| e.is_dir()) {
            tree.entry(entry.path.clone()).or_default();
        }
        tree.insert(dir.to_string(), entries);
    }

    pub fn names_in(&self, dir: &str) -> Vec<String> {
        let tree = self.tree.lock().unwrap();
        tree.get(dir)
            .map(|entries| entries.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn stream_path(&self, path: &str) {
        self.streamed.lock().unwrap().insert(path.to_string());
    }

    /// Make every listing of `path` fail with `NotFound` from now on.
    pub fn fail_list_of(&self, path: &str) {
        self.unreadable.lock().unwrap().insert(path.to_string());
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: EngineError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_search(&self) -> Option<SearchRequest> {
        self.last_search.lock().unwrap().clone()
    }

    pub fn push_listing_batch(&self, id: ListingId, path: &str, entries: Vec<Entry>, done: bool) {
        self.push_listing_batch_as(id, id, path, entries, done);
    }

    /// Deliver a listing batch on the stream of `route_to` while claiming to
    /// be `claimed_id`.
    pub fn push_listing_batch_as(
        &self,
        route_to: ListingId,
        claimed_id: ListingId,
        path: &str,
        entries: Vec<Entry>,
        done: bool,
    ) {
        let senders = self.listing_senders.lock().unwrap();
        if let Some(tx) = senders.get(&route_to.0) {
            let _ = tx.send(ListingBatch {
                listing_id: claimed_id,
                path: path.to_string(),
                entries,
                done,
            });
        }
    }

    /// Deliver a batch on the stream of `route_to` while claiming to be
    /// `claimed_id`, simulating a misrouted late event.
    pub fn push_search_batch_as(
        &self,
        route_to: SearchId,
        claimed_id: SearchId,
        results: Vec<SearchResult>,
        scanned_count: usize,
        done: bool,
    ) {
        let senders = self.search_senders.lock().unwrap();
        if let Some(tx) = senders.get(&route_to.0) {
            let _ = tx.send(SearchBatch {
                search_id: claimed_id,
                results,
                scanned_count,
                done,
            });
        }
    }

    pub fn push_search_batch(
        &self,
        id: SearchId,
        results: Vec<SearchResult>,
        scanned_count: usize,
        done: bool,
    ) {
        self.push_search_batch_as(id, id, results, scanned_count, done);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, op: &'static str) -> Result<()> {
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn find(&self, path: &str) -> Option<Entry> {
        let tree = self.tree.lock().unwrap();
        tree.get(&parent_of(path))
            .and_then(|entries| entries.iter().find(|e| e.path == path).cloned())
    }

    fn insert(&self, dir: &str, entry: Entry) -> Result<Entry> {
        let mut tree = self.tree.lock().unwrap();
        let siblings = tree
            .get_mut(dir)
            .ok_or_else(|| EngineError::NotFound(dir.to_string()))?;
        if siblings.iter().any(|e| e.name == entry.name) {
            return Err(EngineError::AlreadyExists(entry.path));
        }
        siblings.push(entry.clone());
        if entry.is_dir() {
            tree.entry(entry.path.clone()).or_default();
        }
        Ok(entry)
    }

    fn remove(&self, path: &str) -> Result<Entry> {
        let mut tree = self.tree.lock().unwrap();
        let siblings = tree
            .get_mut(&parent_of(path))
            .ok_or_else(|| EngineError::NotFound(path.to_string()))?;
        let pos = siblings
            .iter()
            .position(|e| e.path == path)
            .ok_or_else(|| EngineError::NotFound(path.to_string()))?;
        let entry = siblings.remove(pos);
        tree.remove(path);
        Ok(entry)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn list_directory(&self, path: &str) -> Result<DirectoryListing> {
        self.record(format!("list:{}", path));
        self.check_failure("list")?;
        if self.unreadable.lock().unwrap().contains(path) {
            return Err(EngineError::NotFound(path.to_string()));
        }
        let entries = {
            let tree = self.tree.lock().unwrap();
            tree.get(path)
                .cloned()
                .ok_or_else(|| EngineError::NotFound(path.to_string()))?
        };

        if self.streamed.lock().unwrap().contains(path) {
            let id = self.next_id();
            let tx = self.listings.open(id);
            self.listing_senders.lock().unwrap().insert(id, tx);
            return Ok(DirectoryListing {
                path: path.to_string(),
                entries: entries.into_iter().take(1).collect(),
                listing_id: Some(ListingId(id)),
            });
        }

        Ok(DirectoryListing {
            path: path.to_string(),
            entries,
            listing_id: None,
        })
    }

    fn subscribe_listing(&self, listing_id: ListingId) -> EventStream<ListingBatch> {
        self.listings.subscribe(listing_id.0)
    }

    async fn cancel_listing(&self, listing_id: ListingId) {
        self.record(format!("cancel_listing:{}", listing_id.0));
        self.listings.discard(listing_id.0);
    }

    async fn create_directory(&self, parent_path: &str, name: &str) -> Result<Entry> {
        self.record(format!("mkdir:{}", join(parent_path, name)));
        self.check_failure("mkdir")?;
        self.insert(parent_path, folder(parent_path, name))
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<Entry> {
        self.record(format!("rename:{}->{}", path, new_name));
        self.check_failure("rename")?;
        let dir = parent_of(path);
        let target = join(&dir, new_name);
        if self.find(&target).is_some() {
            return Err(EngineError::AlreadyExists(target));
        }
        let mut entry = self.remove(path)?;
        entry.name = new_name.to_string();
        entry.path = target;
        self.insert(&dir, entry)
    }

    async fn copy(&self, source_path: &str, dest_dir: &str) -> Result<Entry> {
        self.record(format!("copy:{}->{}", source_path, dest_dir));
        self.check_failure("copy")?;
        let mut entry = self
            .find(source_path)
            .ok_or_else(|| EngineError::NotFound(source_path.to_string()))?;
        if self.find(&join(dest_dir, &entry.name)).is_some() {
            entry.name = format!("{} - Copy", entry.name);
        }
        entry.path = join(dest_dir, &entry.name);
        self.insert(dest_dir, entry)
    }

    async fn move_entry(&self, source_path: &str, dest_dir: &str) -> Result<Entry> {
        self.record(format!("move:{}->{}", source_path, dest_dir));
        self.check_failure("move")?;
        let mut entry = self
            .find(source_path)
            .ok_or_else(|| EngineError::NotFound(source_path.to_string()))?;
        let target = join(dest_dir, &entry.name);
        if self.find(&target).is_some() {
            return Err(EngineError::AlreadyExists(target));
        }
        self.remove(source_path)?;
        entry.path = target;
        self.insert(dest_dir, entry)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.record(format!("delete:{}", path));
        self.check_failure("delete")?;
        self.remove(path).map(|_| ())
    }

    async fn move_to_trash(&self, paths: &[String]) -> Result<()> {
        self.record(format!("trash:{}", paths.join(",")));
        self.check_failure("trash")?;
        if let Some(missing) = paths.iter().find(|p| self.find(p).is_none()) {
            return Err(EngineError::NotFound(missing.clone()));
        }
        for path in paths {
            self.remove(path)?;
        }
        Ok(())
    }

    async fn start_search(&self, request: &SearchRequest) -> Result<SearchId> {
        self.record(format!("search:{}", request.query));
        *self.last_search.lock().unwrap() = Some(request.clone());
        self.check_failure("search")?;
        let id = self.next_id();
        let tx = self.searches.open(id);
        self.search_senders.lock().unwrap().insert(id, tx);
        Ok(SearchId(id))
    }

    fn subscribe_search(&self, search_id: SearchId) -> EventStream<SearchBatch> {
        self.searches.subscribe(search_id.0)
    }

    async fn cancel_search(&self, search_id: SearchId) {
        self.record(format!("cancel_search:{}", search_id.0));
        self.searches.discard(search_id.0);
    }
}
