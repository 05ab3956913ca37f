// src/infrastructure/storage/file.rs
use crate::application::{
    ApplicationError, ApplicationResult,
    ports::storage::{ChangeFeed, KeyValueStore, StorageChange},
};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tokio::sync::broadcast;
use tracing::debug;

/// Key/value storage persisted as one JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written file behind.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> ApplicationResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                ApplicationError::infrastructure(format!("cannot create {}: {err}", parent.display()))
            })?;
        }
        let entries = match fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|err| {
                ApplicationError::infrastructure(format!("corrupt store {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(ApplicationError::infrastructure(format!(
                    "cannot read {}: {err}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), "opened file store");
        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            path,
            entries: Mutex::new(entries),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> ApplicationResult<()> {
        let raw = serde_json::to_vec_pretty(entries)
            .map_err(|err| ApplicationError::infrastructure(err.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|err| {
                ApplicationError::infrastructure(format!("cannot write {}: {err}", self.path.display()))
            })
    }

    fn write(&self, key: &str, value: Option<&str>) -> ApplicationResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).map(String::as_str) == value {
            return Ok(());
        }
        let mut next = entries.clone();
        let old_value = match value {
            Some(value) => next.insert(key.to_owned(), value.to_owned()),
            None => next.remove(key),
        };
        self.persist(&next)?;
        *entries = next;
        // Nobody listening is fine.
        let _ = self.changes.send(StorageChange {
            key: key.to_owned(),
            old_value,
            new_value: value.map(str::to_owned),
        });
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> ApplicationResult<()> {
        self.write(key, Some(value))
    }

    fn remove(&self, key: &str) -> ApplicationResult<()> {
        self.write(key, None)
    }
}

impl ChangeFeed for JsonFileStore {
    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
