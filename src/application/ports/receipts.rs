// src/application/ports/receipts.rs
use crate::application::{
    ApplicationResult,
    dto::receipts::{QuotaStatusDto, UploadAcceptedDto, UploadStatusDto},
    ports::http::ProgressCallback,
};
use crate::domain::upload::UploadFile;
use async_trait::async_trait;

/// The receipt endpoints the upload flow depends on.
#[async_trait]
pub trait ReceiptGateway: Send + Sync {
    async fn upload(
        &self,
        file: UploadFile,
        progress: Option<ProgressCallback>,
    ) -> ApplicationResult<UploadAcceptedDto>;

    async fn upload_status(&self, receipt_id: &str) -> ApplicationResult<UploadStatusDto>;

    async fn quota_status(&self) -> ApplicationResult<QuotaStatusDto>;
}
