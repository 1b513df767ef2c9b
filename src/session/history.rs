use crate::utils::path::{parent_of, same_path};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationHistory {
    paths: Vec<String>,
    index: usize,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh navigation. Forward history is always discarded; the
    /// path is only pushed when it differs from the current one.
    pub fn navigate(&mut self, path: &str) {
        if self.paths.is_empty() {
            self.paths.push(path.to_string());
            self.index = 0;
            return;
        }
        self.paths.truncate(self.index + 1);
        if self.current().is_some_and(|current| same_path(current, path)) {
            return;
        }
        self.paths.push(path.to_string());
        self.index = self.paths.len() - 1;
    }

    pub fn back(&mut self) -> Option<&str> {
        if !self.can_go_back() {
            return None;
        }
        self.index -= 1;
        self.current()
    }

    pub fn forward(&mut self) -> Option<&str> {
        if !self.can_go_forward() {
            return None;
        }
        self.index += 1;
        self.current()
    }

    /// Path `back()` would move to, without moving.
    pub fn back_target(&self) -> Option<&str> {
        if self.can_go_back() {
            self.paths.get(self.index - 1).map(String::as_str)
        } else {
            None
        }
    }

    /// Path `forward()` would move to, without moving.
    pub fn forward_target(&self) -> Option<&str> {
        if self.can_go_forward() {
            self.paths.get(self.index + 1).map(String::as_str)
        } else {
            None
        }
    }

    pub fn can_go_back(&self) -> bool {
        !self.paths.is_empty() && self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        !self.paths.is_empty() && self.index + 1 < self.paths.len()
    }

    pub fn current(&self) -> Option<&str> {
        self.paths.get(self.index).map(String::as_str)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Parent of `path`; a root's parent is the root itself.
    pub fn parent_of(path: &str) -> String {
        parent_of(path)
    }
}
