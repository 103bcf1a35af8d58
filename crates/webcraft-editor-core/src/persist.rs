//! State that survives across sessions.
//!
//! Values are stored as JSON under fixed keys through a [`KeyValueStore`],
//! so the same code runs against browser local storage, a directory of
//! files, or memory in tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::{Tool, ViewportProfile};
use crate::error::StoreError;

pub const DARK_MODE_KEY: &str = "webcraft-darkmode";
pub const AUTOSAVE_KEY: &str = "webcraft-autosave";
pub const RECENT_COLORS_KEY: &str = "webcraft-recent-colors";
pub const FAVORITES_KEY: &str = "webcraft-favorites";
pub const SETTINGS_KEY: &str = "webcraft-settings";
pub const AUTOSAVE_CONTENT_KEY: &str = "webcraft-autosave-content";
pub const CLIPBOARD_KEY: &str = "webcraft-clipboard";

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Milliseconds.
    pub auto_save_interval: u64,
    pub show_rulers: bool,
    pub snap_to_grid: bool,
    /// Grid cell size in pixels.
    pub grid_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save_interval: 30_000,
            show_rulers: true,
            snap_to_grid: false,
            grid_size: 10,
        }
    }
}

/// The last auto-saved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveContent {
    pub html: String,
    pub timestamp: DateTime<Utc>,
    pub device: ViewportProfile,
    pub selected_tool: Tool,
}

/// An image the user marked as a favourite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A copied element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardEntry {
    pub tag_name: String,
    pub class_name: String,
    pub id: String,
    pub html: String,
}

/// String storage under string keys.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Read and decode one key. Missing keys are `Ok(None)`.
pub fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            key: key.to_string(),
            source,
        })
}

pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// Keeps everything in memory. Cloning shares nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a new [`FileStore`] rooted at `dir`. The directory is created
    /// on first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn io_error(key: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(key, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(key, e))?;
        std::fs::write(self.path(key), value).map_err(|e| Self::io_error(key, e))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(key)) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                Err(Self::io_error(key, err))
            }
            _ => Ok(()),
        }
    }
}

/// Everything persisted, loaded at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub dark_mode: bool,
    pub autosave: bool,
    pub recent_colors: Vec<String>,
    pub favorites: Vec<ImageRecord>,
    pub settings: Settings,
    pub autosave_content: Option<AutosaveContent>,
    pub clipboard: Option<ClipboardEntry>,
}

fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    load_lenient(store, key).unwrap_or_default()
}

/// A value that cannot be read is logged and treated as absent.
fn load_lenient<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match load(store, key) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, key, "ignoring unreadable persisted value");
            None
        }
    }
}

impl PersistedState {
    /// Load every key, falling back to defaults for missing or corrupt ones.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            dark_mode: load_or_default(store, DARK_MODE_KEY),
            autosave: load_lenient(store, AUTOSAVE_KEY).unwrap_or(true),
            recent_colors: load_or_default(store, RECENT_COLORS_KEY),
            favorites: load_or_default(store, FAVORITES_KEY),
            settings: load_or_default(store, SETTINGS_KEY),
            autosave_content: load_lenient(store, AUTOSAVE_CONTENT_KEY),
            clipboard: load_lenient(store, CLIPBOARD_KEY),
        }
    }

    /// Write every key back.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        save(store, DARK_MODE_KEY, &self.dark_mode)?;
        save(store, AUTOSAVE_KEY, &self.autosave)?;
        save(store, RECENT_COLORS_KEY, &self.recent_colors)?;
        save(store, FAVORITES_KEY, &self.favorites)?;
        save(store, SETTINGS_KEY, &self.settings)?;
        match &self.autosave_content {
            Some(content) => save(store, AUTOSAVE_CONTENT_KEY, content)?,
            None => store.remove(AUTOSAVE_CONTENT_KEY)?,
        }
        match &self.clipboard {
            Some(entry) => save(store, CLIPBOARD_KEY, entry)?,
            None => store.remove(CLIPBOARD_KEY)?,
        }
        Ok(())
    }
}

/// Move `color` to the front of `recent`, keeping at most `limit` entries.
pub fn push_recent_color(recent: &mut Vec<String>, color: &str, limit: usize) {
    recent.retain(|c| !c.eq_ignore_ascii_case(color));
    recent.insert(0, color.to_string());
    recent.truncate(limit);
}

/// Add `image` to `favorites`, or remove it if its id is already there.
/// Returns true when the image was added.
pub fn toggle_favorite(favorites: &mut Vec<ImageRecord>, image: ImageRecord) -> bool {
    match favorites.iter().position(|f| f.id == image.id) {
        Some(pos) => {
            favorites.remove(pos);
            false
        }
        None => {
            favorites.push(image);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn image(id: &str) -> ImageRecord {
        ImageRecord {
            id: id.into(),
            url: format!("https://images.example/{id}.jpg"),
            thumb: None,
            author: Some("someone".into()),
            source: None,
            width: Some(800),
            height: Some(600),
            tags: vec!["nature".into()],
        }
    }

    #[test]
    fn test_settings_wire_names() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "autoSaveInterval": 30000,
                "showRulers": true,
                "snapToGrid": false,
                "gridSize": 10
            })
        );
        let partial: Settings = serde_json::from_str(r#"{"gridSize": 24}"#).unwrap();
        assert_eq!(partial.grid_size, 24);
        assert_eq!(partial.auto_save_interval, 30_000);
    }

    #[test]
    fn test_round_trip_through_memory() {
        let store = MemoryStore::new();
        let state = PersistedState {
            dark_mode: true,
            autosave: false,
            recent_colors: vec!["#ff0000".into()],
            favorites: vec![image("a")],
            settings: Settings::default(),
            autosave_content: Some(AutosaveContent {
                html: "<p>x</p>".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                device: ViewportProfile::Tablet,
                selected_tool: Tool::Text,
            }),
            clipboard: None,
        };
        state.save(&store).unwrap();
        assert_eq!(PersistedState::load(&store), state);

        let raw = store.get(AUTOSAVE_CONTENT_KEY).unwrap().unwrap();
        assert!(raw.contains(r#""selectedTool":"text""#));
        assert!(raw.contains(r#""timestamp":"2024-01-02T03:04:05Z""#));
    }

    #[test]
    fn test_corrupt_values_fall_back() {
        let store = MemoryStore::new();
        store.set(SETTINGS_KEY, "{not json").unwrap();
        store.set(AUTOSAVE_CONTENT_KEY, r#"{"html": 3}"#).unwrap();
        let state = PersistedState::load(&store);
        assert_eq!(state.settings, Settings::default());
        assert!(state.autosave);
        assert!(state.autosave_content.is_none());
        assert!(matches!(
            load::<Settings>(&store, SETTINGS_KEY),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("webcraft"));
        assert_eq!(store.get(DARK_MODE_KEY).unwrap(), None);
        save(&store, DARK_MODE_KEY, &true).unwrap();
        assert_eq!(load::<bool>(&store, DARK_MODE_KEY).unwrap(), Some(true));
        store.remove(DARK_MODE_KEY).unwrap();
        store.remove(DARK_MODE_KEY).unwrap();
        assert_eq!(store.get(DARK_MODE_KEY).unwrap(), None);
    }

    #[test]
    fn test_recent_colors_and_favorites() {
        let mut recent = vec!["#111".to_string(), "#222".to_string()];
        push_recent_color(&mut recent, "#222", 2);
        assert_eq!(recent, vec!["#222", "#111"]);
        push_recent_color(&mut recent, "#333", 2);
        assert_eq!(recent, vec!["#333", "#222"]);

        let mut favorites = Vec::new();
        assert!(toggle_favorite(&mut favorites, image("a")));
        assert!(toggle_favorite(&mut favorites, image("b")));
        assert!(!toggle_favorite(&mut favorites, image("a")));
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, "b");
    }
}
