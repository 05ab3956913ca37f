// src/infrastructure/storage/mod.rs
pub mod file;
pub mod memory;
pub mod origin;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use origin::{OriginStore, SharedOrigin};
