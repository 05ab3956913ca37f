// src/application/dto/mod.rs
pub mod auth;
pub mod receipts;

use serde::Deserialize;

/// Success responses wrap their payload as `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

pub use auth::{EmailUpdateDto, EmailVerificationDto, LoginDto, RefreshDto};
pub use receipts::{QuotaStatusDto, UploadAcceptedDto, UploadStatusDto};
