use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::services::backend::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Size,
    Modified,
    /// Extension, then name
    Kind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Details,
    List,
    Tiles,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub show_hidden: bool,
    /// Case-insensitive substring filter on names; empty shows everything
    pub filter: String,
    pub view_mode: ViewMode,
}

impl ViewOptions {
    /// Same column twice flips the order, a new column starts ascending.
    pub fn toggle_sort(&mut self, sort_by: SortBy) {
        if self.sort_by == sort_by {
            self.sort_order = match self.sort_order {
                SortOrder::Asc => SortOrder::Desc,
                SortOrder::Desc => SortOrder::Asc,
            };
        } else {
            self.sort_by = sort_by;
            self.sort_order = SortOrder::Asc;
        }
    }
}

fn extension_lower(name: &str) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name[pos + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Directories always first; the requested key and order apply within each group.
pub fn compare_entries(a: &Entry, b: &Entry, sort_by: SortBy, order: SortOrder) -> Ordering {
    match (a.is_dir(), b.is_dir()) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let by_name = || a.name.to_lowercase().cmp(&b.name.to_lowercase());
    let cmp = match sort_by {
        SortBy::Name => by_name(),
        SortBy::Size => a.size.cmp(&b.size).then_with(by_name),
        SortBy::Modified => a.modified.cmp(&b.modified).then_with(by_name),
        SortBy::Kind => extension_lower(&a.name)
            .cmp(&extension_lower(&b.name))
            .then_with(by_name),
    };

    match order {
        SortOrder::Asc => cmp,
        SortOrder::Desc => cmp.reverse(),
    }
}

pub fn is_visible(entry: &Entry, options: &ViewOptions) -> bool {
    if !options.show_hidden && entry.is_hidden() {
        return false;
    }
    let filter = options.filter.trim();
    filter.is_empty() || entry.name.to_lowercase().contains(&filter.to_lowercase())
}

/// The entries the user sees, in the order they see them.
pub fn displayed_entries(entries: &[Entry], options: &ViewOptions) -> Vec<Entry> {
    let mut shown: Vec<Entry> = entries
        .iter()
        .filter(|e| is_visible(e, options))
        .cloned()
        .collect();
    shown.sort_by(|a, b| compare_entries(a, b, options.sort_by, options.sort_order));
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{file, folder};

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sample() -> Vec<Entry> {
        vec![
            file("/d", "b.txt", 30),
            folder("/d", "Zeta"),
            file("/d", "A.md", 10),
            file("/d", ".env", 5),
            folder("/d", "alpha"),
            file("/d", "c.rs", 20),
        ]
    }

    #[test]
    fn test_directories_first_then_name() {
        let shown = displayed_entries(&sample(), &ViewOptions::default());
        assert_eq!(names(&shown), vec!["alpha", "Zeta", "A.md", "b.txt", "c.rs"]);
    }

    #[test]
    fn test_hidden_toggle() {
        let options = ViewOptions {
            show_hidden: true,
            ..Default::default()
        };
        let shown = displayed_entries(&sample(), &options);
        assert!(names(&shown).contains(&".env"));
    }

    #[test]
    fn test_size_desc_keeps_directories_first() {
        let options = ViewOptions {
            sort_by: SortBy::Size,
            sort_order: SortOrder::Desc,
            ..Default::default()
        };
        let shown = displayed_entries(&sample(), &options);
        assert_eq!(names(&shown), vec!["Zeta", "alpha", "b.txt", "c.rs", "A.md"]);
    }

    #[test]
    fn test_kind_sort_groups_extensions() {
        let options = ViewOptions {
            sort_by: SortBy::Kind,
            ..Default::default()
        };
        let shown = displayed_entries(&sample(), &options);
        assert_eq!(names(&shown)[2..].to_vec(), vec!["A.md", "c.rs", "b.txt"]);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let options = ViewOptions {
            filter: "  ALP ".to_string(),
            ..Default::default()
        };
        let shown = displayed_entries(&sample(), &options);
        assert_eq!(names(&shown), vec!["alpha"]);
    }

    #[test]
    fn test_toggle_sort() {
        let mut options = ViewOptions::default();
        options.toggle_sort(SortBy::Name);
        assert_eq!(options.sort_order, SortOrder::Desc);
        options.toggle_sort(SortBy::Size);
        assert_eq!(options.sort_by, SortBy::Size);
        assert_eq!(options.sort_order, SortOrder::Asc);
    }
}
