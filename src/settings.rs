use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "TALLY_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    /// Adapter key -> raw column names, replacing the built-in layout.
    #[serde(default)]
    pub column_layouts: BTreeMap<String, Vec<String>>,
}

fn default_history_file() -> String {
    "history.csv".to_string()
}

fn default_data_dir() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("tally")
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_file: default_history_file(),
            column_layouts: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// The raw column layout override configured for an adapter, if any.
    pub fn layout_for(&self, key: &str) -> Option<Vec<&str>> {
        self.column_layouts
            .get(key)
            .map(|cols| cols.iter().map(String::as_str).collect())
    }

    pub fn history_path(&self, root: &Path) -> PathBuf {
        root.join(&self.history_file)
    }
}

fn settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tally")
        .join("settings.json")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

/// Missing file yields defaults. A malformed file is reported and ignored.
pub fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read settings, using defaults");
            return Settings::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed settings, using defaults");
            Settings::default()
        }
    }
}

pub fn shellexpand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let json = r#"{
            "data_dir": "/tmp/spending",
            "history_file": "ledger.csv",
            "column_layouts": {"amex": ["Date", "Description", "Amount", "Extended Details"]}
        }"#;
        std::fs::write(&path, json).unwrap();
        let s = load_settings_from(&path);
        assert_eq!(s.data_dir, "/tmp/spending");
        assert_eq!(s.history_path(Path::new("/data")), PathBuf::from("/data/ledger.csv"));
        assert_eq!(s.layout_for("amex").unwrap().len(), 4);
        assert!(s.layout_for("citi").is_none());
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(s.history_file, "history.csv");
        assert!(s.column_layouts.is_empty());
        assert!(s.data_dir.ends_with("tally"));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.history_file, "history.csv");
        assert_eq!(s.data_dir, "/tmp/test");
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let s = load_settings_from(&path);
        assert_eq!(s.history_file, "history.csv");
    }

    #[test]
    fn test_shellexpand_path() {
        assert_eq!(shellexpand_path("/srv/data"), PathBuf::from("/srv/data"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(shellexpand_path("~/money"), home.join("money"));
        }
    }
}
