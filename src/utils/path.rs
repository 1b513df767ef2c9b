use serde::Serialize;

/// One clickable segment of a breadcrumb bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Separator style used by `path`: backslash only for drive paths without any
/// forward slash.
pub fn separator(path: &str) -> char {
    if has_drive_prefix(path) && !path.contains('/') {
        '\\'
    } else {
        '/'
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Root identifier of `path` ("/" or "C:\"), empty for relative paths.
pub fn root_of(path: &str) -> String {
    if has_drive_prefix(path) {
        format!("{}{}", &path[..2], separator(path))
    } else if path.starts_with(is_separator) {
        "/".to_string()
    } else {
        String::new()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    let rest = if has_drive_prefix(path) { &path[2..] } else { path };
    rest.split(is_separator).filter(|s| !s.is_empty())
}

/// Decompose a path into its breadcrumb trail, root first.
pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let root = root_of(path);
    let sep = separator(path);
    let mut crumbs = Vec::new();
    let mut current = root.clone();

    if !root.is_empty() {
        let name = root.trim_end_matches(is_separator);
        crumbs.push(Breadcrumb {
            name: if name.is_empty() { root.clone() } else { name.to_string() },
            path: root.clone(),
        });
    }

    for segment in segments(path) {
        if !current.is_empty() && !current.ends_with(is_separator) {
            current.push(sep);
        }
        current.push_str(segment);
        crumbs.push(Breadcrumb {
            name: segment.to_string(),
            path: current.clone(),
        });
    }

    crumbs
}

/// True when `path` names a root (nothing above it).
pub fn is_root(path: &str) -> bool {
    segments(path).next().is_none()
}

/// Parent directory; the parent of a root is the root itself.
pub fn parent_of(path: &str) -> String {
    let crumbs = breadcrumbs(path);
    match crumbs.len() {
        0 => path.to_string(),
        1 => crumbs[0].path.clone(),
        n => crumbs[n - 2].path.clone(),
    }
}

/// Last path segment, or the root itself.
pub fn file_name(path: &str) -> String {
    segments(path)
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| root_of(path))
}

pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with(is_separator) {
        format!("{}{}", dir, name)
    } else {
        format!("{}{}{}", dir, separator(dir), name)
    }
}

/// Compare two paths ignoring trailing separators.
pub fn same_path(a: &str, b: &str) -> bool {
    let trim = |p: &str| -> String {
        let trimmed = p.trim_end_matches(is_separator);
        if trimmed.is_empty() || (has_drive_prefix(p) && trimmed.len() == 2) {
            root_of(p)
        } else {
            trimmed.to_string()
        }
    };
    trim(a) == trim(b)
}
