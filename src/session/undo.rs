use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{EngineError, Result};
use crate::services::backend::Backend;
use crate::utils::path::{file_name, join, parent_of};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// `path` is where the entry lived before the rename.
    Rename {
        path: String,
        old_name: String,
        new_name: String,
    },
    Move {
        source_path: String,
        dest_path: String,
        original_dir: String,
    },
}

impl UndoAction {
    /// Short label for menus, e.g. "Undo rename of notes.txt".
    pub fn description(&self) -> String {
        match self {
            UndoAction::Rename { old_name, new_name, .. } => {
                format!("Undo rename of {} to {}", old_name, new_name)
            }
            UndoAction::Move { source_path, .. } => {
                format!("Undo move of {}", file_name(source_path))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoStack {
    actions: Arc<Mutex<Vec<UndoAction>>>,
    max_depth: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            actions: Arc::new(Mutex::new(Vec::new())),
            max_depth: max_depth.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UndoAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, action: UndoAction) {
        let mut actions = self.lock();
        actions.push(action);
        let overflow = actions.len().saturating_sub(self.max_depth);
        if overflow > 0 {
            actions.drain(..overflow);
        }
    }

    pub fn peek(&self) -> Option<UndoAction> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Replay the inverse of the newest action. The record is removed only
    /// once the inverse succeeded; on failure the stack is left as it was.
    pub async fn undo(&self, backend: &dyn Backend) -> Result<UndoAction> {
        let action = self.peek().ok_or(EngineError::NothingToUndo)?;

        let result = match &action {
            UndoAction::Rename { path, old_name, new_name } => {
                let renamed = join(&parent_of(path), new_name);
                backend.rename(&renamed, old_name).await.map(|_| ())
            }
            UndoAction::Move { dest_path, original_dir, .. } => {
                backend.move_entry(dest_path, original_dir).await.map(|_| ())
            }
        };

        if let Err(e) = result {
            tracing::warn!(event = "undo.failed", action = %action.description(), error = %e);
            return Err(e);
        }

        // Other sessions may have pushed while the inverse was running
        let mut actions = self.lock();
        if let Some(pos) = actions.iter().rposition(|a| *a == action) {
            actions.remove(pos);
        }
        tracing::debug!(event = "undo.applied", action = %action.description());
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{file, ScriptedBackend};

    fn rename(path: &str, old_name: &str, new_name: &str) -> UndoAction {
        UndoAction::Rename {
            path: path.to_string(),
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_stack() {
        let backend = ScriptedBackend::new();
        let stack = UndoStack::new(10);
        assert_eq!(stack.undo(&backend).await, Err(EngineError::NothingToUndo));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_undo_is_lifo() {
        let backend = ScriptedBackend::new();
        backend.set_entries("/d", vec![file("/d", "b1", 1), file("/d", "b2", 1)]);
        let stack = UndoStack::new(10);
        stack.push(rename("/d/a1", "a1", "b1"));
        stack.push(rename("/d/a2", "a2", "b2"));

        let first = stack.undo(&backend).await.unwrap();
        assert_eq!(first, rename("/d/a2", "a2", "b2"));
        let second = stack.undo(&backend).await.unwrap();
        assert_eq!(second, rename("/d/a1", "a1", "b1"));
        assert!(!stack.can_undo());
        assert_eq!(backend.calls(), vec!["rename:/d/b2->a2", "rename:/d/b1->a1"]);
    }

    #[tokio::test]
    async fn test_failed_undo_preserves_stack() {
        let backend = ScriptedBackend::new();
        backend.set_entries("/d", vec![file("/d", "b1", 1)]);
        let stack = UndoStack::new(10);
        stack.push(rename("/d/a1", "a1", "b1"));
        backend.fail_next("rename", EngineError::PermissionDenied("/d/b1".to_string()));

        let err = stack.undo(&backend).await.unwrap_err();
        assert_eq!(err, EngineError::PermissionDenied("/d/b1".to_string()));
        assert_eq!(stack.len(), 1);

        assert!(stack.undo(&backend).await.is_ok());
        assert!(stack.is_empty());
    }

    #[tokio::test]
    async fn test_undo_move_moves_back() {
        let backend = ScriptedBackend::new();
        backend.add_dir("/src");
        backend.set_entries("/dst", vec![file("/dst", "f.txt", 3)]);
        let stack = UndoStack::new(10);
        stack.push(UndoAction::Move {
            source_path: "/src/f.txt".to_string(),
            dest_path: "/dst/f.txt".to_string(),
            original_dir: "/src".to_string(),
        });

        stack.undo(&backend).await.unwrap();
        assert_eq!(backend.names_in("/src"), vec!["f.txt"]);
        assert!(backend.names_in("/dst").is_empty());
    }

    #[test]
    fn test_depth_cap_drops_oldest() {
        let stack = UndoStack::new(2);
        stack.push(rename("/d/a", "a", "b"));
        stack.push(rename("/d/c", "c", "d"));
        stack.push(rename("/d/e", "e", "f"));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.peek(), Some(rename("/d/e", "e", "f")));
    }

    #[test]
    fn test_description() {
        assert_eq!(rename("/d/a", "a", "b").description(), "Undo rename of a to b");
    }
}
