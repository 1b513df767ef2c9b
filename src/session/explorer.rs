use std::sync::Arc;

use crate::config::Settings;
use crate::error::{EngineError, Result};
use crate::services::backend::{Backend, Entry};
use crate::services::file_ops::is_valid_filename;
use crate::session::clipboard::{Clipboard, ClipboardEntry, ClipboardOperation};
use crate::session::history::NavigationHistory;
use crate::session::listing::DirectoryStreamCoordinator;
use crate::session::selection::{ClickModifiers, MarqueeRect, RowLayout, SelectionModel};
use crate::session::undo::{UndoAction, UndoStack};
use crate::session::view::{displayed_entries, SortBy, ViewMode, ViewOptions};
use crate::utils::path::{breadcrumbs, file_name, parent_of, same_path, Breadcrumb};

/// Services shared by every session in a window.
#[derive(Clone)]
pub struct SessionServices {
    pub backend: Arc<dyn Backend>,
    pub clipboard: Clipboard,
    pub undo: UndoStack,
    pub settings: Arc<Settings>,
}

impl SessionServices {
    pub fn new(backend: Arc<dyn Backend>, settings: Settings) -> Self {
        Self {
            backend,
            clipboard: Clipboard::new(),
            undo: UndoStack::new(settings.undo.max_depth),
            settings: Arc::new(settings),
        }
    }
}

/// Inline rename in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameState {
    pub path: String,
    pub original_name: String,
}

/// One navigable file-browsing surface.
pub struct ExplorerSession {
    services: SessionServices,
    history: NavigationHistory,
    listing: DirectoryStreamCoordinator,
    view: ViewOptions,
    selection: SelectionModel,
    renaming: Option<RenameState>,
    pending_delete: Vec<Entry>,
}

impl ExplorerSession {
    pub fn new(services: SessionServices) -> Self {
        let panel = &services.settings.panel;
        let view = ViewOptions {
            sort_by: panel.sort_by,
            sort_order: panel.sort_order,
            show_hidden: panel.show_hidden,
            filter: String::new(),
            view_mode: panel.view_mode,
        };
        Self {
            listing: DirectoryStreamCoordinator::new(services.backend.clone()),
            services,
            history: NavigationHistory::new(),
            view,
            selection: SelectionModel::new(),
            renaming: None,
            pending_delete: Vec::new(),
        }
    }

    // ---- state ----

    pub fn current_path(&self) -> Option<&str> {
        self.history.current()
    }

    pub fn title(&self) -> String {
        self.current_path().map(file_name).unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.listing.is_loading()
    }

    pub fn error(&self) -> Option<&str> {
        self.listing.error()
    }

    pub fn clear_error(&mut self) {
        self.listing.clear_error();
    }

    pub fn entries(&self) -> &[Entry] {
        self.listing.entries()
    }

    /// Entries in display order (hidden filter, name filter, sort).
    pub fn displayed_entries(&self) -> Vec<Entry> {
        displayed_entries(self.listing.entries(), &self.view)
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.current_path().map(breadcrumbs).unwrap_or_default()
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    pub fn view(&self) -> &ViewOptions {
        &self.view
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn selected_entries(&self) -> Vec<Entry> {
        let display = self.displayed_entries();
        self.selection
            .selected_entries(&display)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn can_undo(&self) -> bool {
        self.services.undo.can_undo()
    }

    pub fn undo_label(&self) -> Option<String> {
        self.services.undo.peek().map(|a| a.description())
    }

    pub fn renaming(&self) -> Option<&RenameState> {
        self.renaming.as_ref()
    }

    pub fn pending_delete(&self) -> &[Entry] {
        &self.pending_delete
    }

    pub fn services(&self) -> &SessionServices {
        &self.services
    }

    // ---- navigation ----

    /// Open `path` as a new history entry.
    pub async fn navigate(&mut self, path: &str) -> Result<()> {
        self.open(path).await?;
        self.history.navigate(path);
        Ok(())
    }

    /// Returns `Ok(false)` when there is nothing to go back to.
    pub async fn back(&mut self) -> Result<bool> {
        let Some(target) = self.history.back_target().map(str::to_string) else {
            return Ok(false);
        };
        self.open(&target).await?;
        self.history.back();
        Ok(true)
    }

    pub async fn forward(&mut self) -> Result<bool> {
        let Some(target) = self.history.forward_target().map(str::to_string) else {
            return Ok(false);
        };
        self.open(&target).await?;
        self.history.forward();
        Ok(true)
    }

    /// Go to the parent directory and select the folder we came from.
    pub async fn up(&mut self) -> Result<bool> {
        let current = self.require_current()?;
        let parent = parent_of(&current);
        if same_path(&parent, &current) {
            return Ok(false);
        }
        self.navigate(&parent).await?;
        let display = self.displayed_entries();
        self.selection.select_path(&display, &current);
        Ok(true)
    }

    /// Re-read the current directory, keeping the selection where possible.
    pub async fn refresh(&mut self) -> Result<()> {
        let current = self.require_current()?;
        self.listing.load(&current).await?;
        self.revalidate_selection();
        Ok(())
    }

    /// Merge streamed listing batches. Returns the number of new entries.
    pub fn poll(&mut self) -> usize {
        let appended = self.listing.poll();
        if appended > 0 {
            self.revalidate_selection();
        }
        appended
    }

    async fn open(&mut self, path: &str) -> Result<()> {
        self.listing.load(path).await?;
        self.selection.clear();
        self.renaming = None;
        self.pending_delete.clear();
        Ok(())
    }

    fn require_current(&self) -> Result<String> {
        self.current_path()
            .map(str::to_string)
            .ok_or(EngineError::NoCurrentDirectory)
    }

    /// Refresh after a mutation. A failed re-read is already recorded as the
    /// session error and must not mask the mutation's own result.
    async fn reload(&mut self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(event = "session.reload_failed", error = %e);
        }
    }

    fn revalidate_selection(&mut self) {
        let display = self.displayed_entries();
        self.selection.revalidate(&display);
    }

    // ---- view ----

    pub fn toggle_hidden(&mut self) {
        self.view.show_hidden = !self.view.show_hidden;
        self.revalidate_selection();
    }

    /// Same column flips the order; a new column sorts ascending.
    pub fn set_sort(&mut self, sort_by: SortBy) {
        self.view.toggle_sort(sort_by);
        self.revalidate_selection();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view.view_mode = mode;
    }

    pub fn set_filter(&mut self, filter: &str) {
        self.view.filter = filter.to_string();
        self.revalidate_selection();
    }

    // ---- selection ----

    pub fn click(&mut self, index: usize, modifiers: ClickModifiers) {
        let display = self.displayed_entries();
        self.selection.click(&display, index, modifiers);
    }

    pub fn marquee(&mut self, rect: &MarqueeRect, layout: &RowLayout, additive: bool) {
        let display = self.displayed_entries();
        self.selection.marquee(&display, rect, layout, additive);
    }

    pub fn select_all(&mut self) {
        let display = self.displayed_entries();
        self.selection.select_all(&display);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn move_focus(&mut self, delta: i32, extend: bool) {
        let display = self.displayed_entries();
        self.selection.move_focus(&display, delta, extend);
    }

    pub fn select_by_prefix(&mut self, prefix: &str) -> bool {
        let display = self.displayed_entries();
        self.selection.select_by_prefix(&display, prefix)
    }

    fn primary_selected(&self) -> Result<Entry> {
        let display = self.displayed_entries();
        self.selection
            .primary(&display)
            .cloned()
            .ok_or(EngineError::NoSelection)
    }

    // ---- rename ----

    /// Begin renaming the primary selected entry. Returns its current name
    /// for the edit field.
    pub fn start_rename(&mut self) -> Result<String> {
        let entry = self.primary_selected()?;
        let name = entry.name.clone();
        self.renaming = Some(RenameState {
            path: entry.path,
            original_name: entry.name,
        });
        Ok(name)
    }

    pub fn cancel_rename(&mut self) {
        self.renaming = None;
    }

    /// Apply the rename started with [`start_rename`](Self::start_rename).
    /// An unchanged name just ends the edit. On failure the edit stays open.
    pub async fn confirm_rename(&mut self, new_name: &str) -> Result<Option<Entry>> {
        let state = self.renaming.clone().ok_or(EngineError::NoSelection)?;
        let new_name = new_name.trim();
        if new_name == state.original_name {
            self.renaming = None;
            return Ok(None);
        }
        is_valid_filename(new_name)
            .map_err(|reason| EngineError::InvalidName(format!("{}: {}", new_name, reason)))?;

        let renamed = self.services.backend.rename(&state.path, new_name).await?;
        self.renaming = None;
        self.services.undo.push(UndoAction::Rename {
            path: state.path.clone(),
            old_name: state.original_name.clone(),
            new_name: renamed.name.clone(),
        });
        tracing::debug!(event = "session.renamed", from = %state.path, to = %renamed.path);

        self.reload().await;
        let display = self.displayed_entries();
        self.selection.select_path(&display, &renamed.path);
        Ok(Some(renamed))
    }

    // ---- delete ----

    /// Stage the selected entries for deletion and return them for the
    /// confirmation prompt.
    pub fn start_delete(&mut self) -> Result<Vec<Entry>> {
        let selected = self.selected_entries();
        if selected.is_empty() {
            return Err(EngineError::NoSelection);
        }
        self.pending_delete = selected.clone();
        Ok(selected)
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete.clear();
    }

    /// Remove every staged entry and re-read the directory.
    ///
    /// By default the entries go to the trash in a single backend call. With
    /// `permanent` each entry is deleted on its own; all are attempted and
    /// the first failure is returned.
    pub async fn confirm_delete(&mut self, permanent: bool) -> Result<usize> {
        let targets = std::mem::take(&mut self.pending_delete);
        if targets.is_empty() {
            return Err(EngineError::NoSelection);
        }

        let outcome = if permanent {
            self.delete_each(&targets).await
        } else {
            let paths: Vec<String> = targets.iter().map(|e| e.path.clone()).collect();
            match self.services.backend.move_to_trash(&paths).await {
                Ok(()) => Ok(paths.len()),
                Err(e) => {
                    tracing::warn!(event = "session.trash_failed", count = paths.len(), error = %e);
                    Err(e)
                }
            }
        };

        self.reload().await;
        outcome
    }

    async fn delete_each(&self, targets: &[Entry]) -> Result<usize> {
        let mut deleted = 0;
        let mut first_error = None;
        for entry in targets {
            match self.services.backend.delete(&entry.path).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(event = "session.delete_failed", path = %entry.path, error = %e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    // ---- create ----

    pub async fn create_folder(&mut self, name: &str) -> Result<Entry> {
        let current = self.require_current()?;
        let name = name.trim();
        is_valid_filename(name)
            .map_err(|reason| EngineError::InvalidName(format!("{}: {}", name, reason)))?;
        let created = self.services.backend.create_directory(&current, name).await?;
        self.reload().await;
        let display = self.displayed_entries();
        self.selection.select_path(&display, &created.path);
        Ok(created)
    }

    // ---- clipboard ----

    pub fn copy_to_clipboard(&mut self) -> Result<()> {
        let entry = self.primary_selected()?;
        self.services.clipboard.copy(entry);
        Ok(())
    }

    pub fn cut_to_clipboard(&mut self) -> Result<()> {
        let entry = self.primary_selected()?;
        self.services.clipboard.cut(entry);
        Ok(())
    }

    /// Paste the clipboard entry into the current directory. The clipboard is
    /// only consumed once the backend reported success.
    pub async fn paste(&mut self) -> Result<Entry> {
        let current = self.require_current()?;
        let item = self
            .services
            .clipboard
            .peek()
            .ok_or(EngineError::NothingInClipboard)?;

        let pasted = self.paste_item(&item, &current).await?;
        self.services.clipboard.take_if(&item);
        self.reload().await;
        let display = self.displayed_entries();
        self.selection.select_path(&display, &pasted.path);
        Ok(pasted)
    }

    async fn paste_item(&self, item: &ClipboardEntry, dest_dir: &str) -> Result<Entry> {
        let backend = &self.services.backend;
        match item.operation {
            ClipboardOperation::Copy => backend.copy(&item.entry.path, dest_dir).await,
            ClipboardOperation::Cut => {
                let moved = backend.move_entry(&item.entry.path, dest_dir).await?;
                self.services.undo.push(UndoAction::Move {
                    source_path: item.entry.path.clone(),
                    dest_path: moved.path.clone(),
                    original_dir: parent_of(&item.entry.path),
                });
                Ok(moved)
            }
        }
    }

    // ---- undo ----

    pub async fn undo(&mut self) -> Result<UndoAction> {
        let action = self.services.undo.undo(self.services.backend.as_ref()).await?;
        if self.current_path().is_some() {
            self.reload().await;
        }
        Ok(action)
    }

    /// Release the session: any listing in flight is cancelled.
    pub async fn dispose(&mut self) {
        self.listing.cancel().await;
        self.renaming = None;
        self.pending_delete.clear();
    }
}
