use std::fs;
use std::io;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::session::view::{SortBy, SortOrder, ViewMode};

/// Per-pane defaults applied to every new session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSettings {
    #[serde(default)]
    pub start_path: Option<String>,
    #[serde(default)]
    pub show_hidden: bool,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub view_mode: ViewMode,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            start_path: None,
            show_hidden: false,
            sort_by: SortBy::Name,
            sort_order: SortOrder::Asc,
            view_mode: ViewMode::Details,
        }
    }
}

/// Directory listing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSettings {
    /// Entries returned inline before the rest is streamed
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    500
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Quick-open and content search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_filename_limit")]
    pub filename_limit: usize,
    #[serde(default = "default_content_limit")]
    pub content_limit: usize,
}

fn default_debounce_ms() -> u64 {
    30
}

fn default_filename_limit() -> usize {
    50
}

fn default_content_limit() -> usize {
    500
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            filename_limit: default_filename_limit(),
            content_limit: default_content_limit(),
        }
    }
}

/// Dual-pane divider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSettings {
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f32,
    #[serde(default = "default_min_split_ratio")]
    pub min_split_ratio: f32,
    #[serde(default = "default_max_split_ratio")]
    pub max_split_ratio: f32,
}

fn default_split_ratio() -> f32 {
    0.5
}

fn default_min_split_ratio() -> f32 {
    0.2
}

fn default_max_split_ratio() -> f32 {
    0.8
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            split_ratio: default_split_ratio(),
            min_split_ratio: default_min_split_ratio(),
            max_split_ratio: default_max_split_ratio(),
        }
    }
}

impl LayoutSettings {
    /// Bounds with min <= max and both strictly inside (0, 1)
    pub fn bounds(&self) -> (f32, f32) {
        let lo = self.min_split_ratio.clamp(0.05, 0.95);
        let hi = self.max_split_ratio.clamp(0.05, 0.95);
        if lo <= hi { (lo, hi) } else { (hi, lo) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoSettings {
    #[serde(default = "default_undo_depth")]
    pub max_depth: usize,
}

fn default_undo_depth() -> usize {
    100
}

impl Default for UndoSettings {
    fn default() -> Self {
        Self {
            max_depth: default_undo_depth(),
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub panel: PanelSettings,
    #[serde(default)]
    pub listing: ListingSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub undo: UndoSettings,
}

impl Settings {
    /// Returns the config directory path (~/.explorer)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".explorer"))
    }

    /// Returns the config file path (~/.explorer/settings.json)
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.json"))
    }

    /// Loads settings from the config file, returns default if not found or invalid
    pub fn load() -> Self {
        match Self::load_with_error() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(event = "settings.defaulted", error = %e, "using default settings");
                Self::default()
            }
        }
    }

    /// Loads settings from the config file with error information
    pub fn load_with_error() -> Result<Self, String> {
        let config_path = Self::config_path()
            .ok_or_else(|| "Could not determine config path".to_string())?;

        let content = fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        serde_json::from_str(content)
            .map_err(|e| format!("Invalid JSON in settings.json: {}", e))
    }

    /// Saves settings to the config file using atomic write pattern
    pub fn save(&self) -> io::Result<()> {
        let Some(config_dir) = Self::config_dir() else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine config directory",
            ));
        };
        self.save_to(&config_dir)
    }

    pub fn save_to(&self, config_dir: &std::path::Path) -> io::Result<()> {
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            // Set directory permissions to user-only on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = fs::Permissions::from_mode(0o700);
                let _ = fs::set_permissions(config_dir, perms);
            }
        }

        let config_path = config_dir.join("settings.json");
        let temp_path = config_dir.join("settings.json.tmp");
        let content = serde_json::to_string_pretty(self)?;

        // Atomic write: write to temp file first, then rename
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &config_path)?;

        Ok(())
    }

    /// Initial directory for new panes: the configured start path when it is
    /// absolute and still a directory, otherwise the home directory.
    pub fn start_path(&self) -> String {
        if let Some(path_str) = &self.panel.start_path {
            let path = PathBuf::from(path_str);
            if path.is_absolute() && path.is_dir() {
                return path_str.clone();
            }
        }
        dirs::home_dir()
            .map(|h| h.display().to_string())
            .unwrap_or_else(|| "/".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.panel.sort_by, SortBy::Name);
        assert_eq!(settings.panel.sort_order, SortOrder::Asc);
        assert!(!settings.panel.show_hidden);
        assert_eq!(settings.search.debounce_ms, 30);
        assert_eq!(settings.listing.batch_size, 500);
        assert_eq!(settings.undo.max_depth, 100);
    }

    #[test]
    fn test_parse_partial_json() {
        let json = r#"{"panel":{"start_path":"/tmp","sort_by":"size"},
            "search":{"debounce_ms":80}}"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.panel.start_path, Some("/tmp".to_string()));
        assert_eq!(settings.panel.sort_by, SortBy::Size);
        assert_eq!(settings.panel.sort_order, SortOrder::Asc);
        assert_eq!(settings.search.debounce_ms, 80);
        assert_eq!(settings.search.filename_limit, 50);
    }

    #[test]
    fn test_invalid_json_reports_error() {
        let err = Settings::from_json("{not json").unwrap_err();
        assert!(err.starts_with("Invalid JSON"));
    }

    #[test]
    fn test_layout_bounds_are_ordered() {
        let layout = LayoutSettings {
            split_ratio: 0.5,
            min_split_ratio: 0.9,
            max_split_ratio: 0.1,
        };
        assert_eq!(layout.bounds(), (0.1, 0.9));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.layout.split_ratio = 0.3;
        settings.save_to(dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let reloaded = Settings::from_json(&content).unwrap();
        assert!((reloaded.layout.split_ratio - 0.3).abs() < f32::EPSILON);
        assert!(!dir.path().join("settings.json.tmp").exists());
    }
}
