use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use nucleo::pattern::{CaseMatching, Normalization, Pattern};
use nucleo::{Config, Matcher, Utf32Str};
use regex::{Regex, RegexBuilder};

use crate::error::{EngineError, Result};
use crate::services::backend::{
    ContentMatch, EntryKind, SearchBatch, SearchId, SearchOptions, SearchRequest, SearchResult,
};

/// Directories never descended into
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    ".cache",
    ".npm",
    ".cargo",
    "target",
    "build",
    "dist",
    "out",
    ".idea",
    ".vscode",
];

/// Extensions treated as binary and skipped by content search
const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "o", "a", "lib", "obj", "class", "jar", "war", "ear",
    "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "iso", "dmg", "img", "pdf", "doc", "docx",
    "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "png", "jpg", "jpeg", "gif", "bmp",
    "ico", "svg", "webp", "mp3", "mp4", "avi", "mkv", "mov", "wmv", "flv", "wav", "flac",
    "ogg", "woff", "woff2", "ttf", "otf", "eot", "pyc", "pyo", "wasm", "node",
];

/// Scanned entries per filename batch
const FILENAME_BATCH_SIZE: usize = 100;

/// Filename search stops after this many entries
const MAX_SCANNED_ENTRIES: usize = 10_000;

/// Matching files per content batch
const CONTENT_BATCH_SIZE: usize = 10;

pub fn clamp_filename_limit(limit: usize) -> usize {
    limit.clamp(1, 100)
}

pub fn clamp_content_limit(limit: usize) -> usize {
    limit.clamp(1, 1000)
}

pub fn is_binary_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BINARY_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn should_skip(name: &str, is_dir: bool, include_hidden: bool) -> bool {
    (!include_hidden && name.starts_with('.')) || (is_dir && SKIP_DIRS.contains(&name))
}

/// Compile the line matcher for a content query: literal unless regex mode,
/// case-insensitive unless asked otherwise.
pub fn content_matcher(query: &str, options: &SearchOptions) -> Result<Regex> {
    let pattern = if options.regex {
        query.to_string()
    } else {
        regex::escape(query)
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!options.case_sensitive)
        .build()
        .map_err(|e| EngineError::InvalidPattern(e.to_string()))
}

struct WalkEntry {
    path: PathBuf,
    name: String,
    is_dir: bool,
}

/// Breadth-first directory walk. Symlinked directories are reported but not
/// followed; unreadable directories are skipped.
struct Walk {
    queue: VecDeque<PathBuf>,
    pending: VecDeque<WalkEntry>,
    include_hidden: bool,
}

impl Walk {
    fn new(root: &Path, include_hidden: bool) -> Self {
        Self {
            queue: VecDeque::from([root.to_path_buf()]),
            pending: VecDeque::new(),
            include_hidden,
        }
    }

    fn read_next_dir(&mut self) -> bool {
        let Some(dir) = self.queue.pop_front() else {
            return false;
        };
        let Ok(read_dir) = fs::read_dir(&dir) else {
            return true;
        };
        let mut children: Vec<WalkEntry> = read_dir
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let file_type = e.file_type().ok()?;
                let name = e.file_name().to_string_lossy().to_string();
                let is_dir = file_type.is_dir();
                if should_skip(&name, is_dir, self.include_hidden) {
                    return None;
                }
                Some(WalkEntry { path: e.path(), name, is_dir })
            })
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        for child in children {
            if child.is_dir {
                self.queue.push_back(child.path.clone());
            }
            self.pending.push_back(child);
        }
        true
    }
}

impl Iterator for Walk {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(entry);
            }
            if !self.read_next_dir() {
                return None;
            }
        }
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn cancelled(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}

/// Fuzzy-match entry names under `request.root`.
///
/// Each batch carries the matches of the entries scanned since the previous
/// batch that made it into the running top `limit`, best first. The last
/// batch has `done` set.
pub fn run_filename_search(
    search_id: SearchId,
    request: &SearchRequest,
    cancel: &AtomicBool,
    tx: &Sender<SearchBatch>,
) {
    let root = PathBuf::from(&request.root);
    let limit = clamp_filename_limit(request.limit);
    let case = if request.options.case_sensitive {
        CaseMatching::Respect
    } else {
        CaseMatching::Ignore
    };
    let pattern = Pattern::parse(&request.query, case, Normalization::Smart);
    let mut matcher = Matcher::new(Config::DEFAULT);

    let mut top_scores: Vec<u32> = Vec::new();
    let mut pending: Vec<WalkEntry> = Vec::new();
    let mut scanned = 0;

    let mut flush = |pending: &mut Vec<WalkEntry>, scanned: usize, done: bool| -> bool {
        let mut buf = Vec::new();
        let mut scored: Vec<SearchResult> = pending
            .drain(..)
            .filter_map(|entry| {
                let score = pattern.score(Utf32Str::new(&entry.name, &mut buf), &mut matcher)?;
                Some(SearchResult {
                    relative_path: relative_to(&root, &entry.path),
                    path: entry.path.to_string_lossy().to_string(),
                    name: entry.name,
                    kind: if entry.is_dir { EntryKind::Directory } else { EntryKind::File },
                    score,
                    matches: Vec::new(),
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));

        // Keep only what enters the running top list
        let mut admitted = Vec::new();
        for result in scored {
            let floor = if top_scores.len() < limit {
                None
            } else {
                top_scores.last().copied()
            };
            if floor.is_some_and(|f| result.score <= f) {
                continue;
            }
            let pos = top_scores.partition_point(|s| *s >= result.score);
            top_scores.insert(pos, result.score);
            top_scores.truncate(limit);
            admitted.push(result);
        }

        tracing::trace!(
            event = "search.filename_batch",
            search_id = %search_id,
            results = admitted.len(),
            scanned,
            done
        );
        tx.send(SearchBatch {
            search_id,
            results: admitted,
            scanned_count: scanned,
            done,
        })
        .is_ok()
    };

    for entry in Walk::new(&root, request.options.include_hidden).take(MAX_SCANNED_ENTRIES) {
        if cancelled(cancel) {
            return;
        }
        pending.push(entry);
        scanned += 1;
        if pending.len() >= FILENAME_BATCH_SIZE && !flush(&mut pending, scanned, false) {
            return;
        }
    }

    if !cancelled(cancel) {
        flush(&mut pending, scanned, true);
    }
}

/// Find line matches of `matcher` in text files under `request.root`.
/// `scanned_count` reports files searched so far.
pub fn run_content_search(
    search_id: SearchId,
    request: &SearchRequest,
    matcher: &Regex,
    cancel: &AtomicBool,
    tx: &Sender<SearchBatch>,
) {
    let root = PathBuf::from(&request.root);
    let max_matches = clamp_content_limit(request.limit);
    let mut results: Vec<SearchResult> = Vec::new();
    let mut files_searched = 0;
    let mut total_matches = 0;

    for entry in Walk::new(&root, request.options.include_hidden) {
        if cancelled(cancel) {
            return;
        }
        if total_matches >= max_matches {
            break;
        }
        if entry.is_dir || is_binary_file(&entry.path) {
            continue;
        }
        // Unreadable or non-UTF-8 files are not text
        let Ok(content) = fs::read_to_string(&entry.path) else {
            continue;
        };
        files_searched += 1;

        let mut matches = Vec::new();
        'lines: for (index, line) in content.lines().enumerate() {
            for m in matcher.find_iter(line) {
                if total_matches + matches.len() >= max_matches {
                    break 'lines;
                }
                if m.start() == m.end() {
                    continue;
                }
                matches.push(ContentMatch {
                    line_number: index as u64 + 1,
                    column: m.start() as u64 + 1,
                    line_content: line.trim_end().to_string(),
                    match_start: m.start(),
                    match_end: m.end(),
                });
            }
        }
        if matches.is_empty() {
            continue;
        }

        total_matches += matches.len();
        results.push(SearchResult {
            relative_path: relative_to(&root, &entry.path),
            path: entry.path.to_string_lossy().to_string(),
            name: entry.name,
            kind: EntryKind::File,
            score: matches.len() as u32,
            matches,
        });

        if results.len() >= CONTENT_BATCH_SIZE {
            let batch = SearchBatch {
                search_id,
                results: std::mem::take(&mut results),
                scanned_count: files_searched,
                done: false,
            };
            if tx.send(batch).is_err() {
                return;
            }
        }
    }

    if !cancelled(cancel) {
        tracing::trace!(
            event = "search.content_done",
            search_id = %search_id,
            files_searched,
            total_matches
        );
        let _ = tx.send(SearchBatch {
            search_id,
            results,
            scanned_count: files_searched,
            done: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::backend::SearchKind;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("README.md"), "hello world\nHello again\n").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {\n    println!(\"hello\");\n}\n").unwrap();
        fs::write(root.join("src/nested/main_helper.rs"), "// nothing here\n").unwrap();
        fs::write(root.join("node_modules/pkg/main.js"), "hello").unwrap();
        fs::write(root.join(".git/config"), "hello").unwrap();
        fs::write(root.join("logo.png"), "hello").unwrap();
        tmp
    }

    fn request(kind: SearchKind, query: &str, root: &Path, limit: usize) -> SearchRequest {
        SearchRequest {
            kind,
            query: query.to_string(),
            root: root.to_string_lossy().to_string(),
            limit,
            options: SearchOptions::default(),
        }
    }

    fn collect(rx: mpsc::Receiver<SearchBatch>) -> (Vec<SearchResult>, Vec<SearchBatch>) {
        let batches: Vec<SearchBatch> = rx.try_iter().collect();
        let results = batches.iter().flat_map(|b| b.results.clone()).collect();
        (results, batches)
    }

    #[test]
    fn test_filename_search_skips_heavy_and_hidden() {
        let tmp = tree();
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let req = request(SearchKind::Filename, "main", tmp.path(), 50);
        run_filename_search(SearchId(1), &req, &cancel, &tx);

        let (results, batches) = collect(rx);
        let mut names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["main.rs", "main_helper.rs"]);
        assert!(batches.last().unwrap().done);
        assert!(results.iter().all(|r| r.matches.is_empty()));
        let main = results.iter().find(|r| r.name == "main.rs").unwrap();
        assert_eq!(main.relative_path, Path::new("src").join("main.rs").to_string_lossy());
    }

    #[test]
    fn test_filename_search_respects_limit() {
        let tmp = TempDir::new().unwrap();
        for i in 0..30 {
            fs::write(tmp.path().join(format!("file{}.txt", i)), "").unwrap();
        }
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let req = request(SearchKind::Filename, "file", tmp.path(), 5);
        run_filename_search(SearchId(1), &req, &cancel, &tx);
        let (results, batches) = collect(rx);
        assert_eq!(results.len(), 5);
        assert_eq!(batches.last().unwrap().scanned_count, 30);
    }

    #[test]
    fn test_cancelled_search_sends_nothing() {
        let tmp = tree();
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(true);
        let req = request(SearchKind::Filename, "main", tmp.path(), 50);
        run_filename_search(SearchId(1), &req, &cancel, &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_content_search_literal_case_insensitive() {
        let tmp = tree();
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let req = request(SearchKind::Content, "hello", tmp.path(), 500);
        let matcher = content_matcher(&req.query, &req.options).unwrap();
        run_content_search(SearchId(2), &req, &matcher, &cancel, &tx);

        let (results, batches) = collect(rx);
        let mut paths: Vec<&str> = results.iter().map(|r| r.relative_path.as_str()).collect();
        paths.sort();
        let main_rs = Path::new("src").join("main.rs").to_string_lossy().to_string();
        assert_eq!(paths, vec!["README.md", main_rs.as_str()]);

        let readme = results.iter().find(|r| r.name == "README.md").unwrap();
        assert_eq!(readme.matches.len(), 2);
        assert_eq!(readme.matches[1].line_number, 2);
        assert_eq!(readme.matches[1].column, 1);
        assert_eq!(readme.matches[1].line_content, "Hello again");

        let main = results.iter().find(|r| r.name == "main.rs").unwrap();
        assert_eq!(main.matches[0].match_start, 14);
        assert_eq!(main.matches[0].match_end, 19);
        assert_eq!(main.matches[0].column, 15);

        let last = batches.last().unwrap();
        assert!(last.done);
        assert_eq!(last.scanned_count, 3);
    }

    #[test]
    fn test_content_search_caps_total_matches() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "x x x x\nx x\n").unwrap();
        let (tx, rx) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let req = request(SearchKind::Content, "x", tmp.path(), 3);
        let matcher = content_matcher("x", &req.options).unwrap();
        run_content_search(SearchId(3), &req, &matcher, &cancel, &tx);
        let (results, _) = collect(rx);
        assert_eq!(results[0].matches.len(), 3);
    }

    #[test]
    fn test_content_matcher_modes() {
        let literal = content_matcher("a.b", &SearchOptions::default()).unwrap();
        assert!(literal.is_match("A.B"));
        assert!(!literal.is_match("axb"));

        let options = SearchOptions {
            regex: true,
            case_sensitive: true,
            ..Default::default()
        };
        let re = content_matcher("a.b", &options).unwrap();
        assert!(re.is_match("axb"));
        assert!(!re.is_match("AXB"));

        let err = content_matcher("(", &options).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPattern(_)));
    }

    #[test]
    fn test_is_binary_file() {
        assert!(is_binary_file(Path::new("test.PNG")));
        assert!(is_binary_file(Path::new("lib.so")));
        assert!(!is_binary_file(Path::new("main.rs")));
        assert!(!is_binary_file(Path::new("Makefile")));
    }
}
