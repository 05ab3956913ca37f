// src/application/ports/storage.rs
use crate::application::ApplicationResult;
use tokio::sync::broadcast;

/// String key/value storage with browser-storage semantics: synchronous,
/// last write wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> ApplicationResult<()>;

    fn remove(&self, key: &str) -> ApplicationResult<()>;
}

/// A write observed on storage shared between tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Change notifications for storage shared between tabs. Only writes that
/// actually change a value are published.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// Storage that survives the tab and is visible to every tab of the origin.
pub trait DurableStore: KeyValueStore + ChangeFeed {}

impl<T: KeyValueStore + ChangeFeed + ?Sized> DurableStore for T {}
