// src/domain/sync/mod.rs
pub mod events;
pub mod tab;

pub use events::{SyncEnvelope, SyncEvent, SyncEventKind};
pub use tab::TabId;
