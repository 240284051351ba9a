// KV store abstraction backing the dismissal service (§6 persisted state).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum KvStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvStoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvStoreError>;
    fn delete(&self, key: &str) -> Result<(), KvStoreError>;
    fn keys(&self) -> Result<Vec<String>, KvStoreError>;
}

/// A single JSON document on disk, `{recommendations: {<key>: <value>}}`,
/// written atomically (temp file + rename) on every mutation.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    recommendations: HashMap<String, String>,
}

pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<Document>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KvStoreError> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Document::default()
        };
        Ok(Self { path, state: Mutex::new(state) })
    }

    /// `~/.finfocus/dismissed.json`, creating the parent directory if needed.
    pub fn default_path() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".finfocus").join("dismissed.json")
    }

    fn flush(&self, document: &Document) -> Result<(), KvStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(document)?;
        let tmp_path = tmp_path_for(&self.path);
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvStoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.recommendations.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvStoreError> {
        let mut state = self.state.lock().unwrap();
        state.recommendations.insert(key.to_string(), value.to_string());
        self.flush(&state)
    }

    fn delete(&self, key: &str) -> Result<(), KvStoreError> {
        let mut state = self.state.lock().unwrap();
        state.recommendations.remove(key);
        self.flush(&state)
    }

    fn keys(&self) -> Result<Vec<String>, KvStoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.recommendations.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dismissed.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set("rec-1", "dismissed").unwrap();
        assert_eq!(store.get("rec-1").unwrap(), Some("dismissed".to_string()));

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("rec-1").unwrap(), Some("dismissed".to_string()));
    }

    #[test]
    fn delete_removes_key() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("d.json")).unwrap();
        store.set("k", "v").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nonexistent.json")).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
