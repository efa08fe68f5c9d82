use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A flat string key-value store with browser local-storage semantics
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` when the key is absent
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove_item(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        (**self).remove_item(key)
    }
}

/// In-process storage, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items()?.remove(key);
        Ok(())
    }
}

/// Directory-backed storage: each key is a `<key>.json` file
#[derive(Debug, Clone)]
pub struct FileStorage {
    storage_dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> Result<Self> {
        let storage_dir = Self::expand_tilde(storage_dir.as_ref())?;

        if !storage_dir.exists() {
            fs::create_dir_all(&storage_dir)
                .with_context(|| format!("Failed to create storage directory: {}", storage_dir.display()))?;
        }

        Ok(Self { storage_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Expand ~ to home directory
    fn expand_tilde(path: &Path) -> Result<PathBuf> {
        let path_str = path.to_string_lossy();
        if let Some(rest) = path_str.strip_prefix("~/") {
            let home = std::env::var("HOME")
                .context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(rest))
        } else if path_str == "~" {
            let home = std::env::var("HOME")
                .context("HOME environment variable not set")?;
            Ok(PathBuf::from(home))
        } else {
            Ok(path.to_path_buf())
        }
    }

    /// Keys become file names, so they are limited to a safe alphabet
    fn item_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            anyhow::bail!("Invalid storage key: {:?}", key);
        }
        Ok(self.storage_dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.item_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read storage item from {}", path.display()))?;
        let value = match String::from_utf8(bytes) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Storage item {} is not valid UTF-8, decoding lossily", path.display());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(Some(value))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.item_path(key)?;
        // Write next to the target and rename so readers never see a half-written item
        let tmp_path = self.storage_dir.join(format!(".{}.json.tmp", key));

        let mut tmp_file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        tmp_file
            .write_all(value.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .with_context(|| format!("Failed to write storage item to {}", tmp_path.display()))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to move storage item into {}", path.display()))?;

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.item_path(key)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete storage item: {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);

        storage.set_item("k", "v1").unwrap();
        storage.set_item("k", "v2").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v2"));

        storage.remove_item("k").unwrap();
        storage.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_file_storage_writes_one_file_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested")).unwrap();

        storage.set_item("chat_sessions_text", "{}").unwrap();

        let path = dir.path().join("nested").join("chat_sessions_text.json");
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert_eq!(storage.get_item("chat_sessions_text").unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.get_item("chat_sessions_image").unwrap(), None);

        storage.remove_item("chat_sessions_text").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_storage_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.set_item("a", "1").unwrap();
        storage.set_item("a", "2").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json".to_string()]);
    }

    #[test]
    fn test_file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        assert!(storage.set_item("../escape", "x").is_err());
        assert!(storage.get_item("a/b").is_err());
        assert!(storage.remove_item("").is_err());
        assert!(storage.set_item(".hidden", "x").is_err());
    }

    #[test]
    fn test_file_storage_reads_invalid_utf8_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        fs::write(dir.path().join("k.json"), b"ab\xffcd").unwrap();

        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("ab\u{FFFD}cd"));
    }
}
