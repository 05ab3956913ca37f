// src/infrastructure/mod.rs
pub mod http;
pub mod navigation;
pub mod notifications;
pub mod storage;
pub mod time;
