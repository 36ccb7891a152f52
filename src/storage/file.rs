//! 文件会话存储
//! 以 JSON 对象形式持久化到磁盘，每次修改立即写回

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::{SessionStore, StoreError};

pub struct FileSessionStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileSessionStore {
    /// 打开（或新建）会话文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = entries.len(), "Session store opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // 先写临时文件再重命名，避免中途失败留下半截文件
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("portal-session-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_path();

        {
            let store = FileSessionStore::open(&path).unwrap();
            store.set("accessToken", "abc").unwrap();
            store.set("refreshToken", "def").unwrap();
            store.remove("refreshToken").unwrap();
        }

        let reopened = FileSessionStore::open(&path).unwrap();
        assert_eq!(reopened.get("accessToken").unwrap().as_deref(), Some("abc"));
        assert!(reopened.get("refreshToken").unwrap().is_none());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let path = temp_path();
        let store = FileSessionStore::open(&path).unwrap();
        assert!(store.get("accessToken").unwrap().is_none());
        // 未写入时不创建文件
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = temp_path();
        std::fs::write(&path, "not json").unwrap();

        let result = FileSessionStore::open(&path);
        assert!(matches!(result, Err(StoreError::Serialization(_))));

        std::fs::remove_file(&path).ok();
    }
}
