// src/application/upload/mod.rs
pub mod controller;

pub use controller::{PollingConfig, UploadController, UploadOutcome};
