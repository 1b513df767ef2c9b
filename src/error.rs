use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing in clipboard")]
    NothingInClipboard,

    #[error("No current directory")]
    NoCurrentDirectory,

    #[error("No entry selected")]
    NoSelection,

    #[error("Cannot close the last tab")]
    LastTab,

    #[error("Unknown tab: {0}")]
    UnknownTab(u64),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("{0}")]
    Backend(String),
}

impl EngineError {
    /// Precondition failures that are reported to the user but never indicate
    /// a broken backend.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            EngineError::NothingToUndo
                | EngineError::NothingInClipboard
                | EngineError::NoCurrentDirectory
                | EngineError::NoSelection
                | EngineError::LastTab
        )
    }

    /// Map an io error for `path` onto the taxonomy.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => EngineError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => EngineError::PermissionDenied(path.to_string()),
            io::ErrorKind::AlreadyExists => EngineError::AlreadyExists(path.to_string()),
            _ => EngineError::Io(err.to_string()),
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => EngineError::NotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => EngineError::PermissionDenied(err.to_string()),
            io::ErrorKind::AlreadyExists => EngineError::AlreadyExists(err.to_string()),
            _ => EngineError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_mapping() {
        let err = EngineError::from_io(io::Error::new(io::ErrorKind::NotFound, "gone"), "/a");
        assert_eq!(err, EngineError::NotFound("/a".to_string()));

        let err = EngineError::from_io(
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
            "/root",
        );
        assert_eq!(err, EngineError::PermissionDenied("/root".to_string()));

        let err: EngineError = io::Error::other("disk on fire").into();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn test_benign_classification() {
        assert!(EngineError::NothingToUndo.is_benign());
        assert!(EngineError::NothingInClipboard.is_benign());
        assert!(EngineError::LastTab.is_benign());
        assert!(!EngineError::NotFound("/x".into()).is_benign());
        assert!(!EngineError::Backend("boom".into()).is_benign());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(EngineError::NothingToUndo.to_string(), "Nothing to undo");
        assert_eq!(
            EngineError::AlreadyExists("/a/b".into()).to_string(),
            "Path already exists: /a/b"
        );
    }
}
