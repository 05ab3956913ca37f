// src/infrastructure/storage/origin.rs
use crate::application::{
    ApplicationResult,
    ports::storage::{ChangeFeed, KeyValueStore, StorageChange},
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::broadcast;
use tracing::trace;

const FEED_CAPACITY: usize = 64;

#[derive(Default)]
struct OriginInner {
    entries: Mutex<HashMap<String, String>>,
    tabs: Mutex<Vec<(u64, broadcast::Sender<StorageChange>)>>,
    next_tab: AtomicU64,
}

/// Durable storage shared by every tab of one origin, living in-process.
///
/// Like browser storage events, a write is announced to every *other* handle
/// opened on the origin, and only when it actually changes the stored value.
#[derive(Clone, Default)]
pub struct SharedOrigin {
    inner: Arc<OriginInner>,
}

impl SharedOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a handle for one tab.
    pub fn open(&self) -> OriginStore {
        let id = self.inner.next_tab.fetch_add(1, Ordering::SeqCst);
        let (changes, _) = broadcast::channel(FEED_CAPACITY);
        self.inner
            .tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, changes.clone()));
        OriginStore {
            id,
            origin: Arc::clone(&self.inner),
            changes,
        }
    }

    /// Reads a value without going through any tab.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// One tab's handle on a [`SharedOrigin`].
pub struct OriginStore {
    id: u64,
    origin: Arc<OriginInner>,
    changes: broadcast::Sender<StorageChange>,
}

impl OriginStore {
    fn write(&self, key: &str, value: Option<&str>) {
        let mut entries = self.origin.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let old_value = match value {
            Some(value) => entries.insert(key.to_owned(), value.to_owned()),
            None => entries.remove(key),
        };
        if old_value.as_deref() == value {
            return;
        }
        let change = StorageChange {
            key: key.to_owned(),
            old_value,
            new_value: value.map(str::to_owned),
        };
        // Delivered while the entry lock is held so every tab sees writes in order.
        let tabs = self.origin.tabs.lock().unwrap_or_else(PoisonError::into_inner);
        for (id, feed) in tabs.iter().filter(|(id, _)| *id != self.id) {
            if feed.send(change.clone()).is_err() {
                trace!(tab = id, key, "no listener for storage change");
            }
        }
    }
}

impl KeyValueStore for OriginStore {
    fn get(&self, key: &str) -> Option<String> {
        self.origin
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> ApplicationResult<()> {
        self.write(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> ApplicationResult<()> {
        self.write(key, None);
        Ok(())
    }
}

impl ChangeFeed for OriginStore {
    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

impl Drop for OriginStore {
    fn drop(&mut self) {
        self.origin
            .tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}
