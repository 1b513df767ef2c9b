use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Deepest directory nesting a recursive copy will follow
const MAX_COPY_DEPTH: usize = 256;

/// Highest `n` tried for "name - Copy (n)"
const MAX_COPY_SUFFIX: usize = 1000;

/// Maximum filename length (POSIX limit)
const MAX_FILENAME_LENGTH: usize = 255;

fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    if !b.exists() {
        return Ok(false);
    }
    Ok(a.canonicalize()? == b.canonicalize()?)
}

/// Copy a file or directory to `dest`, which must not exist yet.
pub fn copy_file(src: &Path, dest: &Path) -> io::Result<()> {
    if same_file(src, dest)? {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Source and destination are the same file",
        ));
    }
    if dest.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        ));
    }

    let metadata = fs::metadata(src)?;

    // Devices, sockets and pipes have no meaningful copy
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        let file_type = metadata.file_type();
        if file_type.is_block_device()
            || file_type.is_char_device()
            || file_type.is_fifo()
            || file_type.is_socket()
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot copy special file (device, socket, or pipe)",
            ));
        }
    }

    if metadata.is_dir() {
        copy_dir_recursive(src, dest)
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

/// Copy a directory tree. Symlinks are recreated, not followed.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    let mut visited = HashSet::new();
    copy_tree(src, dest, &mut visited, 0)
}

fn copy_tree(
    src: &Path,
    dest: &Path,
    visited: &mut HashSet<PathBuf>,
    depth: usize,
) -> io::Result<()> {
    if depth > MAX_COPY_DEPTH {
        return Err(io::Error::other(format!(
            "Maximum directory depth ({}) exceeded - possible circular symlink",
            MAX_COPY_DEPTH
        )));
    }

    let canonical = src.canonicalize().unwrap_or_else(|_| src.to_path_buf());
    if !visited.insert(canonical) {
        return Err(io::Error::other(format!(
            "Circular symlink detected: {}",
            src.display()
        )));
    }

    // Copying a directory into itself would never terminate
    if let (Ok(s), Some(parent)) = (src.canonicalize(), dest.parent()) {
        if parent.canonicalize().map(|p| p.starts_with(&s)).unwrap_or(false) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot copy a directory into itself",
            ));
        }
    }

    fs::create_dir_all(dest)?;

    for child in fs::read_dir(src)? {
        let child = child?;
        let from = child.path();
        let to = dest.join(child.file_name());
        let metadata = fs::symlink_metadata(&from)?;

        if metadata.is_symlink() {
            #[cfg(unix)]
            {
                let target = fs::read_link(&from)?;
                std::os::unix::fs::symlink(&target, &to)?;
            }
            #[cfg(not(unix))]
            {
                if from.is_file() {
                    fs::copy(&from, &to)?;
                }
            }
        } else if metadata.is_dir() {
            copy_tree(&from, &to, visited, depth + 1)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }

    Ok(())
}

/// Move `src` to `dest`. Falls back to copy + delete across filesystems.
pub fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    if same_file(src, dest)? {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Source and destination are the same",
        ));
    }
    if dest.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        ));
    }

    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            tracing::debug!(
                event = "move.cross_device",
                src = %src.display(),
                dest = %dest.display()
            );
            copy_file(src, dest)?;
            delete_file(src)
        }
        Err(e) => Err(e),
    }
}

/// Delete a file or directory tree. A symlink is removed itself, never its
/// target.
pub fn delete_file(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Create a single directory; the parent must exist.
pub fn create_directory(path: &Path) -> io::Result<()> {
    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        ));
    }
    fs::create_dir(path)
}

pub fn rename_file(old_path: &Path, new_path: &Path) -> io::Result<()> {
    if !old_path.exists() && fs::symlink_metadata(old_path).is_err() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", old_path.display()),
        ));
    }
    if new_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", new_path.display()),
        ));
    }
    fs::rename(old_path, new_path)
}

/// Free destination for copying `name` into `dir`: the name itself when
/// unused, then "stem - Copy.ext", then "stem - Copy (n).ext".
/// Directories never have their name split at a dot.
pub fn generate_copy_name(dir: &Path, name: &str, is_dir: bool) -> io::Result<PathBuf> {
    let candidate = dir.join(name);
    if fs::symlink_metadata(&candidate).is_err() {
        return Ok(candidate);
    }

    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 && !is_dir => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    };

    let first = dir.join(format!("{} - Copy{}", stem, ext));
    if fs::symlink_metadata(&first).is_err() {
        return Ok(first);
    }

    for n in 2..=MAX_COPY_SUFFIX {
        let candidate = dir.join(format!("{} - Copy ({}){}", stem, n, ext));
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("Could not find a free name for {}", name),
    ))
}

/// Reject names that cannot safely be created as a single directory entry.
pub fn is_valid_filename(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Filename cannot be empty");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("Filename cannot contain path separators");
    }
    if name.contains('\0') {
        return Err("Filename cannot contain null bytes");
    }
    if name == "." || name == ".." {
        return Err("Invalid filename");
    }
    if name.len() > MAX_FILENAME_LENGTH {
        return Err("Filename too long (max 255 characters)");
    }
    if name.chars().any(char::is_control) {
        return Err("Filename cannot contain control characters");
    }
    if name != name.trim() {
        return Err("Filename cannot start or end with whitespace");
    }
    if name.starts_with('-') {
        return Err("Filename cannot start with hyphen");
    }
    Ok(())
}
