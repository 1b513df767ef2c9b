pub mod clipboard;
pub mod explorer;
pub mod history;
pub mod listing;
pub mod search;
pub mod selection;
pub mod undo;
pub mod view;
pub mod viewport;

pub use clipboard::{Clipboard, ClipboardEntry, ClipboardOperation};
pub use explorer::{ExplorerSession, SessionServices};
pub use history::NavigationHistory;
pub use listing::DirectoryStreamCoordinator;
pub use search::SearchStreamCoordinator;
pub use selection::{ClickModifiers, SelectionModel};
pub use undo::{UndoAction, UndoStack};
