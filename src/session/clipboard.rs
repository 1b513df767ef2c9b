use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::services::backend::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOperation {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardEntry {
    pub entry: Entry,
    pub operation: ClipboardOperation,
}

/// Cheap-clone handle; all clones see the same slot.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    slot: Arc<Mutex<Option<ClipboardEntry>>>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ClipboardEntry>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn copy(&self, entry: Entry) {
        *self.lock() = Some(ClipboardEntry {
            entry,
            operation: ClipboardOperation::Copy,
        });
    }

    pub fn cut(&self, entry: Entry) {
        *self.lock() = Some(ClipboardEntry {
            entry,
            operation: ClipboardOperation::Cut,
        });
    }

    /// Current content. A cut is consumed by this call; a copy stays.
    pub fn take(&self) -> Option<ClipboardEntry> {
        let mut slot = self.lock();
        match slot.as_ref().map(|c| c.operation) {
            Some(ClipboardOperation::Cut) => slot.take(),
            Some(ClipboardOperation::Copy) => slot.clone(),
            None => None,
        }
    }

    pub fn peek(&self) -> Option<ClipboardEntry> {
        self.lock().clone()
    }

    /// `take()`, but only if the slot still holds `expected`. Used after a
    /// paste finished so a clipboard replaced mid-paste is left alone.
    pub fn take_if(&self, expected: &ClipboardEntry) -> Option<ClipboardEntry> {
        let mut slot = self.lock();
        if slot.as_ref() != Some(expected) {
            return None;
        }
        match expected.operation {
            ClipboardOperation::Cut => slot.take(),
            ClipboardOperation::Copy => slot.clone(),
        }
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}
