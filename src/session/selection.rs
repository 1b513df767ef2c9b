use std::collections::HashSet;

use crate::services::backend::Entry;
use crate::session::viewport::RowOffsets;

/// Modifier keys held during a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    /// Ctrl on Linux/Windows, Cmd on macOS
    pub ctrl: bool,
    pub shift: bool,
}

impl ClickModifiers {
    pub const NONE: Self = Self { ctrl: false, shift: false };
    pub const CTRL: Self = Self { ctrl: true, shift: false };
    pub const SHIFT: Self = Self { ctrl: false, shift: true };
}

/// Rubber-band rectangle in list-local coordinates (y grows downward, 0 is the
/// top edge of the list widget including its header).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarqueeRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowHeights {
    Fixed(f32),
    Variable(Vec<f32>),
}

/// Geometry of the rendered list at the time of the drag.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    pub heights: RowHeights,
    /// Sticky column header above the first row
    pub header_height: f32,
    pub scroll_offset: f32,
}

/// First and last row (inclusive) touched by `rect`, or `None` when the
/// rectangle misses every row.
pub fn covered_rows(
    rect: &MarqueeRect,
    layout: &RowLayout,
    row_count: usize,
) -> Option<(usize, usize)> {
    if row_count == 0 {
        return None;
    }
    let to_content = |y: f32| y - layout.header_height + layout.scroll_offset;
    let top = to_content(rect.y0.min(rect.y1));
    let bottom = to_content(rect.y0.max(rect.y1));
    if bottom < 0.0 {
        return None;
    }
    let top = top.max(0.0);

    let (first, last) = match &layout.heights {
        RowHeights::Fixed(h) => {
            if *h <= 0.0 {
                return None;
            }
            let first = (top / h).floor() as usize;
            let last = (bottom / h).floor() as usize;
            (first, last)
        }
        RowHeights::Variable(heights) => {
            let offsets = RowOffsets::from_heights(&heights[..heights.len().min(row_count)]);
            if top >= offsets.total_height() {
                return None;
            }
            (offsets.index_at(top)?, offsets.index_at(bottom)?)
        }
    };

    if first >= row_count {
        return None;
    }
    Some((first, last.min(row_count - 1)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    selected: HashSet<String>,
    anchor: Option<usize>,
    anchor_path: Option<String>,
    focus: Option<usize>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn click(&mut self, display: &[Entry], index: usize, modifiers: ClickModifiers) {
        let Some(entry) = display.get(index) else {
            return;
        };

        if modifiers.shift {
            if let Some(anchor) = self.anchor.filter(|a| *a < display.len()) {
                self.replace_with_range(display, anchor, index);
                self.focus = Some(index);
                return;
            }
        }

        if modifiers.ctrl {
            if !self.selected.remove(&entry.path) {
                self.selected.insert(entry.path.clone());
            }
        } else {
            self.selected.clear();
            self.selected.insert(entry.path.clone());
        }
        self.set_anchor(display, index);
        self.focus = Some(index);
    }

    /// Select the inclusive display range between `a` and `b`, in either order.
    pub fn select_range(&mut self, display: &[Entry], a: usize, b: usize) {
        self.replace_with_range(display, a, b);
    }

    fn replace_with_range(&mut self, display: &[Entry], a: usize, b: usize) {
        self.selected.clear();
        self.add_range(display, a, b);
    }

    fn add_range(&mut self, display: &[Entry], a: usize, b: usize) {
        if display.is_empty() {
            return;
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let hi = hi.min(display.len() - 1);
        if lo > hi {
            return;
        }
        for entry in &display[lo..=hi] {
            self.selected.insert(entry.path.clone());
        }
    }

    /// Rubber-band selection. With `additive` the covered rows join the
    /// current selection instead of replacing it.
    pub fn marquee(
        &mut self,
        display: &[Entry],
        rect: &MarqueeRect,
        layout: &RowLayout,
        additive: bool,
    ) {
        let covered = covered_rows(rect, layout, display.len());
        if !additive {
            self.selected.clear();
        }
        if let Some((first, last)) = covered {
            self.add_range(display, first, last);
            self.focus = Some(last);
        }
    }

    pub fn select_all(&mut self, display: &[Entry]) {
        self.selected = display.iter().map(|e| e.path.clone()).collect();
        if display.is_empty() {
            self.anchor = None;
            self.anchor_path = None;
        } else {
            self.set_anchor(display, 0);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
        self.anchor_path = None;
    }

    /// Select exactly the entry with `path`, if it is displayed.
    pub fn select_path(&mut self, display: &[Entry], path: &str) -> bool {
        match display.iter().position(|e| e.path == path) {
            Some(index) => {
                self.click(display, index, ClickModifiers::NONE);
                true
            }
            None => false,
        }
    }

    /// Keyboard cursor movement. With `extend` the range from the anchor to
    /// the new focus is selected (Shift+Arrow).
    pub fn move_focus(&mut self, display: &[Entry], delta: i32, extend: bool) {
        if display.is_empty() {
            return;
        }
        let last = display.len() as i64 - 1;
        let before_first = if delta >= 0 { -1 } else { last + 1 };
        let current = self.focus.map(|f| f as i64).unwrap_or(before_first);
        let target = (current + delta as i64).clamp(0, last) as usize;
        let modifiers = if extend { ClickModifiers::SHIFT } else { ClickModifiers::NONE };
        self.click(display, target, modifiers);
    }

    /// Type-to-select: jump to the next entry after the focus whose name
    /// starts with `prefix` (case-insensitive), wrapping around.
    pub fn select_by_prefix(&mut self, display: &[Entry], prefix: &str) -> bool {
        let prefix = prefix.to_lowercase();
        if prefix.is_empty() || display.is_empty() {
            return false;
        }
        let start = self.focus.map(|f| f + 1).unwrap_or(0);
        let found = (0..display.len())
            .map(|offset| (start + offset) % display.len())
            .find(|i| display[*i].name.to_lowercase().starts_with(&prefix));
        match found {
            Some(index) => {
                self.click(display, index, ClickModifiers::NONE);
                true
            }
            None => false,
        }
    }

    /// Re-anchor after the display order changed: the anchor follows its
    /// entry or is dropped, and selected paths that are no longer displayed
    /// are pruned.
    pub fn revalidate(&mut self, display: &[Entry]) {
        let visible: HashSet<&str> = display.iter().map(|e| e.path.as_str()).collect();
        self.selected.retain(|p| visible.contains(p.as_str()));

        self.anchor = self
            .anchor_path
            .as_deref()
            .and_then(|path| display.iter().position(|e| e.path == path));
        if self.anchor.is_none() {
            self.anchor_path = None;
        }
        self.focus = self.focus.filter(|f| *f < display.len());
    }

    fn set_anchor(&mut self, display: &[Entry], index: usize) {
        self.anchor = Some(index);
        self.anchor_path = display.get(index).map(|e| e.path.clone());
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.selected.contains(path)
    }

    pub fn selected(&self) -> &HashSet<String> {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    /// Selected entries in display order.
    pub fn selected_entries<'a>(&self, display: &'a [Entry]) -> Vec<&'a Entry> {
        display.iter().filter(|e| self.selected.contains(&e.path)).collect()
    }

    /// The entry single-item actions (rename, copy) apply to: the anchor when
    /// it is selected, otherwise the first selected entry in display order.
    pub fn primary<'a>(&self, display: &'a [Entry]) -> Option<&'a Entry> {
        self.anchor
            .and_then(|a| display.get(a))
            .filter(|e| self.selected.contains(&e.path))
            .or_else(|| display.iter().find(|e| self.selected.contains(&e.path)))
    }
}
