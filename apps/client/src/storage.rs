//! Persisted client state: the `token` and cached `resume` keys live in local
//! storage (a JSON file), `verificationEmail` in session storage (memory).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::errors::ClientError;
use crate::models::ResumeHandle;

pub const TOKEN_KEY: &str = "token";
pub const RESUME_KEY: &str = "resume";
pub const VERIFICATION_EMAIL_KEY: &str = "verificationEmail";

/// String key-value store with browser-storage semantics.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    fn remove(&self, key: &str) -> Result<(), ClientError>;
}

/// Process-lifetime storage. Used for session storage and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
        Ok(())
    }
}

/// Local storage backed by a single JSON object file, rewritten on every mutation.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Opens (or lazily creates) the storage file. A corrupt file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        debug!("Local storage opened at {} ({} keys)", path.display(), entries.len());
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn mutate(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), ClientError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::Storage(std::io::Error::other("storage lock poisoned")))?;
        f(&mut entries);
        self.flush(&entries)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

fn read_entries(path: &Path) -> HashMap<String, String> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return HashMap::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Discarding malformed local storage file {}: {e}", path.display());
        HashMap::new()
    })
}

/// Loads the cached résumé. Malformed JSON or a missing `id`/`url` yields `None`.
pub fn load_resume(storage: &dyn Storage) -> Option<ResumeHandle> {
    let raw = storage.get(RESUME_KEY)?;
    match serde_json::from_str::<ResumeHandle>(&raw) {
        Ok(handle) if !handle.id.is_empty() && !handle.url.is_empty() => Some(handle),
        Ok(_) => {
            warn!("Cached resume is missing id or url; ignoring it");
            None
        }
        Err(e) => {
            warn!("Cached resume is not valid JSON: {e}");
            None
        }
    }
}

pub fn save_resume(storage: &dyn Storage, handle: &ResumeHandle) -> Result<(), ClientError> {
    let json = serde_json::to_string(handle)?;
    storage.set(RESUME_KEY, &json)
}

pub fn clear_resume(storage: &dyn Storage) -> Result<(), ClientError> {
    storage.remove(RESUME_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::{ParseError, ParseStatus};

    fn handle() -> ResumeHandle {
        ResumeHandle {
            id: "65a1".to_string(),
            url: "https://files.example.com/65a1.pdf".to_string(),
            parse_status: ParseStatus::Failed,
            skills: vec!["Rust".to_string()],
            experience: vec!["Acme, 2021-2023".to_string()],
            projects: vec![],
            parse_error: Some(ParseError {
                message: "Unreadable PDF".to_string(),
            }),
        }
    }

    #[test]
    fn test_resume_reloads_identical() {
        let storage = MemoryStorage::new();
        save_resume(&storage, &handle()).unwrap();
        assert_eq!(load_resume(&storage), Some(handle()));
    }

    #[test]
    fn test_resume_missing_url_is_discarded() {
        let storage = MemoryStorage::new();
        storage
            .set(RESUME_KEY, r#"{"id":"65a1","parseStatus":"completed"}"#)
            .unwrap();
        assert_eq!(load_resume(&storage), None);
    }

    #[test]
    fn test_resume_empty_id_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(RESUME_KEY, r#"{"id":"","url":"u"}"#).unwrap();
        assert_eq!(load_resume(&storage), None);
    }

    #[test]
    fn test_resume_malformed_json_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(RESUME_KEY, "{not json").unwrap();
        assert_eq!(load_resume(&storage), None);
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("local_storage.json");

        let storage = FileStorage::open(&path);
        storage.set(TOKEN_KEY, "abc").unwrap();
        save_resume(&storage, &handle()).unwrap();

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get(TOKEN_KEY).as_deref(), Some("abc"));
        assert_eq!(load_resume(&reopened), Some(handle()));

        reopened.remove(TOKEN_KEY).unwrap();
        assert_eq!(FileStorage::open(&path).get(TOKEN_KEY), None);
    }

    #[test]
    fn test_file_storage_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_storage.json");
        std::fs::write(&path, "garbage").unwrap();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get(TOKEN_KEY), None);
        storage.set(TOKEN_KEY, "fresh").unwrap();
        assert_eq!(FileStorage::open(&path).get(TOKEN_KEY).as_deref(), Some("fresh"));
    }
}
