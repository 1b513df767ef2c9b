//! Session engine for multi-pane file browsers.
//!
//! The crate owns the state behind a file-browsing surface: navigation
//! history, cancellable streaming directory listings, multi-selection, a
//! shared clipboard and undo stack, debounced searches, and the tab/pane
//! registry of a window. Filesystem access goes through the
//! [`Backend`](services::backend::Backend) trait; [`LocalBackend`](services::local::LocalBackend)
//! implements it for the native filesystem.

pub mod config;
pub mod error;
pub mod services;
pub mod session;
pub mod utils;
pub mod workspace;

pub use config::Settings;
pub use error::{EngineError, Result};
pub use services::backend::{Backend, Entry, EntryKind};
pub use services::local::LocalBackend;
pub use session::{ExplorerSession, SessionServices};
pub use workspace::{PaneId, TabId, Workspace};
