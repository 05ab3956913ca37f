// src/domain/upload/mod.rs
pub mod entity;
pub mod file;
pub mod status;

pub use entity::{UploadSession, UploadStage};
pub use file::{UploadFile, UploadLimits};
pub use status::ReceiptStatus;
