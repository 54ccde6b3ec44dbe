//! Key-value persistence for user preferences.

use crate::error::{AppError, AppResult};
use parking_lot::RwLock;
use relay_core::Direction;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key of the persisted trade direction.
pub const DIRECTION_KEY: &str = "direction";

/// String key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> AppResult<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as one JSON object. Every `set` rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                AppError::Storage(format!("Failed to parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Store file not found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&*values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Persisted trade direction; anything but `"buy"` reads as sell.
pub fn get_direction(store: &dyn KeyValueStore) -> Direction {
    Direction::from_persisted(store.get(DIRECTION_KEY).as_deref())
}

pub fn set_direction(store: &dyn KeyValueStore, direction: Direction) -> AppResult<()> {
    store.set(DIRECTION_KEY, direction.as_str()).map_err(|e| {
        warn!(error = %e, "Failed to persist direction");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_direction_defaults_to_sell() {
        let store = InMemoryStore::new();
        assert_eq!(get_direction(&store), Direction::Sell);

        store.set(DIRECTION_KEY, "sideways").unwrap();
        assert_eq!(get_direction(&store), Direction::Sell);

        store.set(DIRECTION_KEY, "BUY").unwrap();
        assert_eq!(get_direction(&store), Direction::Sell);
    }

    #[test]
    fn test_direction_round_trip() {
        let store = InMemoryStore::new();
        set_direction(&store, Direction::Buy).unwrap();
        assert_eq!(store.get(DIRECTION_KEY).as_deref(), Some("buy"));
        assert_eq!(get_direction(&store), Direction::Buy);
    }

    #[test]
    fn test_json_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get(DIRECTION_KEY).is_none());
        set_direction(&store, Direction::Buy).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(get_direction(&reopened), Direction::Buy);
    }

    #[test]
    fn test_json_file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(AppError::Storage(_))
        ));
    }
}
