use std::collections::HashMap;
use std::fs::{self, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::error::{EngineError, Result};
use crate::services::backend::{
    Backend, DirectoryListing, Entry, EntryKind, EventHub, EventStream, ListingBatch, ListingId,
    SearchBatch, SearchId, SearchKind, SearchRequest,
};
use crate::services::file_ops;
use crate::services::search;
use crate::session::view::{compare_entries, SortBy, SortOrder};

/// Native filesystem backend. Large listings and searches continue on
/// worker threads that stop when cancelled or when the stream is dropped.
pub struct LocalBackend {
    batch_size: usize,
    next_id: AtomicU64,
    listings: EventHub<ListingBatch>,
    searches: EventHub<SearchBatch>,
    cancel_flags: Arc<Mutex<HashMap<u64, Arc<AtomicBool>>>>,
}

impl LocalBackend {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            next_id: AtomicU64::new(1),
            listings: EventHub::new(),
            searches: EventHub::new(),
            cancel_flags: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn register(&self) -> (u64, Arc<AtomicBool>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let flag = Arc::new(AtomicBool::new(false));
        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.insert(id, flag.clone());
        }
        (id, flag)
    }

    fn raise_cancel(&self, id: u64) {
        if let Ok(mut flags) = self.cancel_flags.lock() {
            if let Some(flag) = flags.remove(&id) {
                flag.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Spawn a worker that forgets its cancel flag once it returns.
    fn spawn_worker<F>(&self, id: u64, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let flags = self.cancel_flags.clone();
        thread::spawn(move || {
            work();
            if let Ok(mut flags) = flags.lock() {
                flags.remove(&id);
            }
        });
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new(500)
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn entry_from(path: &Path) -> Result<Entry> {
    let metadata = fs::metadata(path).map_err(io_error(path))?;
    Ok(entry_with_metadata(path, &metadata))
}

fn entry_with_metadata(path: &Path, metadata: &fs::Metadata) -> Entry {
    let is_dir = metadata.is_dir();
    Entry {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_string(path)),
        path: path_string(path),
        kind: if is_dir { EntryKind::Directory } else { EntryKind::File },
        size: if is_dir { 0 } else { metadata.len() },
        modified: metadata
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now()),
    }
}

/// Read up to `limit` entries. Unreadable or unstat-able children are
/// skipped; symlinks report their target's kind.
fn read_chunk(read_dir: &mut ReadDir, limit: usize) -> (Vec<Entry>, bool) {
    let mut entries = Vec::with_capacity(limit.min(1024));
    for child in read_dir.by_ref() {
        let Ok(child) = child else { continue };
        let path = child.path();
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => match child.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            },
        };
        entries.push(entry_with_metadata(&path, &metadata));
        if entries.len() >= limit {
            return (sorted(entries), false);
        }
    }
    (sorted(entries), true)
}

fn sorted(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| compare_entries(a, b, SortBy::Name, SortOrder::Asc));
    entries
}

fn open_dir(path: &str) -> Result<ReadDir> {
    let dir = Path::new(path);
    let metadata = fs::metadata(dir).map_err(|e| EngineError::from_io(e, path))?;
    if !metadata.is_dir() {
        return Err(EngineError::NotADirectory(path.to_string()));
    }
    fs::read_dir(dir).map_err(|e| EngineError::from_io(e, path))
}

fn require_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    match fs::metadata(&dir) {
        Ok(m) if m.is_dir() => Ok(dir),
        Ok(_) => Err(EngineError::NotADirectory(path.to_string())),
        Err(e) => Err(EngineError::from_io(e, path)),
    }
}

/// Maps an io failure onto the engine taxonomy, naming `path`.
fn io_error(path: &Path) -> impl FnOnce(io::Error) -> EngineError + '_ {
    move |e| EngineError::from_io(e, &path_string(path))
}

fn validate_name(name: &str) -> Result<()> {
    file_ops::is_valid_filename(name)
        .map_err(|reason| EngineError::InvalidName(format!("{}: {}", name, reason)))
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| EngineError::Backend(format!("worker failed: {}", e)))?
}

fn stream_listing(
    listing_id: ListingId,
    path: String,
    mut read_dir: ReadDir,
    batch_size: usize,
    cancel: Arc<AtomicBool>,
    tx: Sender<ListingBatch>,
) {
    loop {
        if cancel.load(Ordering::Relaxed) {
            tracing::trace!(event = "listing.worker_cancelled", listing_id = %listing_id);
            return;
        }
        let (entries, done) = read_chunk(&mut read_dir, batch_size);
        let batch = ListingBatch {
            listing_id,
            path: path.clone(),
            entries,
            done,
        };
        if tx.send(batch).is_err() || done {
            return;
        }
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn list_directory(&self, path: &str) -> Result<DirectoryListing> {
        let batch_size = self.batch_size;
        let owned = path.to_string();
        let (entries, rest) = blocking(move || {
            let mut read_dir = open_dir(&owned)?;
            let (entries, done) = read_chunk(&mut read_dir, batch_size);
            Ok((entries, if done { None } else { Some(read_dir) }))
        })
        .await?;

        let Some(read_dir) = rest else {
            return Ok(DirectoryListing {
                path: path.to_string(),
                entries,
                listing_id: None,
            });
        };

        let (id, cancel) = self.register();
        let listing_id = ListingId(id);
        let tx = self.listings.open(id);
        let owned = path.to_string();
        self.spawn_worker(id, move || {
            stream_listing(listing_id, owned, read_dir, batch_size, cancel, tx)
        });
        tracing::debug!(event = "listing.worker_started", listing_id = %listing_id, path);

        Ok(DirectoryListing {
            path: path.to_string(),
            entries,
            listing_id: Some(listing_id),
        })
    }

    fn subscribe_listing(&self, listing_id: ListingId) -> EventStream<ListingBatch> {
        self.listings.subscribe(listing_id.0)
    }

    async fn cancel_listing(&self, listing_id: ListingId) {
        self.raise_cancel(listing_id.0);
        self.listings.discard(listing_id.0);
    }

    async fn create_directory(&self, parent_path: &str, name: &str) -> Result<Entry> {
        validate_name(name)?;
        let parent = parent_path.to_string();
        let name = name.to_string();
        blocking(move || {
            let dir = require_dir(&parent)?;
            let target = dir.join(&name);
            file_ops::create_directory(&target).map_err(io_error(&target))?;
            entry_from(&target)
        })
        .await
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<Entry> {
        validate_name(new_name)?;
        let source = PathBuf::from(path);
        let new_name = new_name.to_string();
        blocking(move || {
            let parent = source
                .parent()
                .ok_or_else(|| EngineError::InvalidName(path_string(&source)))?;
            let target = parent.join(&new_name);
            if fs::symlink_metadata(&source).is_err() {
                return Err(EngineError::NotFound(path_string(&source)));
            }
            file_ops::rename_file(&source, &target).map_err(io_error(&target))?;
            entry_from(&target)
        })
        .await
    }

    async fn copy(&self, source_path: &str, dest_dir: &str) -> Result<Entry> {
        let source = PathBuf::from(source_path);
        let dest_dir = dest_dir.to_string();
        blocking(move || {
            let metadata = fs::metadata(&source).map_err(io_error(&source))?;
            let dir = require_dir(&dest_dir)?;
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| EngineError::InvalidName(path_string(&source)))?;
            let target = file_ops::generate_copy_name(&dir, &name, metadata.is_dir())
                .map_err(|e| EngineError::from_io(e, &dest_dir))?;
            file_ops::copy_file(&source, &target).map_err(io_error(&target))?;
            entry_from(&target)
        })
        .await
    }

    async fn move_entry(&self, source_path: &str, dest_dir: &str) -> Result<Entry> {
        let source = PathBuf::from(source_path);
        let dest_dir = dest_dir.to_string();
        blocking(move || {
            if fs::symlink_metadata(&source).is_err() {
                return Err(EngineError::NotFound(path_string(&source)));
            }
            let dir = require_dir(&dest_dir)?;
            let name = source
                .file_name()
                .ok_or_else(|| EngineError::InvalidName(path_string(&source)))?;
            let target = dir.join(name);
            if fs::symlink_metadata(&target).is_ok() {
                return Err(EngineError::AlreadyExists(path_string(&target)));
            }
            file_ops::move_file(&source, &target).map_err(io_error(&target))?;
            entry_from(&target)
        })
        .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = PathBuf::from(path);
        blocking(move || file_ops::delete_file(&target).map_err(io_error(&target))).await
    }

    async fn move_to_trash(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let targets: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        blocking(move || {
            if let Some(missing) = targets.iter().find(|t| fs::symlink_metadata(t).is_err()) {
                return Err(EngineError::NotFound(path_string(missing)));
            }
            trash::delete_all(&targets).map_err(|e| {
                tracing::warn!(event = "trash.failed", count = targets.len(), error = %e);
                EngineError::Backend(format!("Failed to move items to trash: {}", e))
            })?;
            tracing::debug!(event = "trash.done", count = targets.len());
            Ok(())
        })
        .await
    }

    async fn start_search(&self, request: &SearchRequest) -> Result<SearchId> {
        if request.query.trim().is_empty() {
            return Err(EngineError::InvalidPattern("empty query".to_string()));
        }
        let root = request.root.clone();
        blocking(move || require_dir(&root).map(|_| ())).await?;

        let matcher = match request.kind {
            SearchKind::Content => Some(search::content_matcher(&request.query, &request.options)?),
            SearchKind::Filename => None,
        };

        let (id, cancel) = self.register();
        let search_id = SearchId(id);
        let tx = self.searches.open(id);
        let request = request.clone();
        tracing::debug!(
            event = "search.worker_started",
            search_id = %search_id,
            kind = ?request.kind
        );
        self.spawn_worker(id, move || match matcher {
            Some(matcher) => {
                search::run_content_search(search_id, &request, &matcher, &cancel, &tx)
            }
            None => search::run_filename_search(search_id, &request, &cancel, &tx),
        });
        Ok(search_id)
    }

    fn subscribe_search(&self, search_id: SearchId) -> EventStream<SearchBatch> {
        self.searches.subscribe(search_id.0)
    }

    async fn cancel_search(&self, search_id: SearchId) {
        self.raise_cancel(search_id.0);
        self.searches.discard(search_id.0);
    }
}
