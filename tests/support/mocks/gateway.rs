// tests/support/mocks/gateway.rs
use async_trait::async_trait;
use receipt_client_core::{
    application::{
        ApplicationError, ApplicationResult,
        dto::{QuotaStatusDto, UploadAcceptedDto, UploadStatusDto},
        error::{ApiError, ErrorKind},
        ports::{http::ProgressCallback, receipts::ReceiptGateway},
    },
    domain::upload::UploadFile,
};
use serde_json::json;
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub enum StatusStep {
    Status(UploadStatusDto),
    /// The status endpoint could not be reached.
    Unavailable,
}

impl StatusStep {
    pub fn status(status: &str, progress: Option<f64>) -> Self {
        Self::Status(
            serde_json::from_value(json!({
                "status": status,
                "progress_percentage": progress,
                "current_stage": "ocr",
            }))
            .unwrap(),
        )
    }

    pub fn failed(message: Option<&str>) -> Self {
        Self::Status(
            serde_json::from_value(json!({ "status": "failed", "error_message": message })).unwrap(),
        )
    }
}

/// In-memory receipt backend driven by scripted answers.
pub struct ScriptedGateway {
    uploads: Mutex<VecDeque<Result<UploadAcceptedDto, ApiError>>>,
    statuses: Mutex<VecDeque<StatusStep>>,
    quota: Mutex<Option<QuotaStatusDto>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
    quota_gate: Mutex<Option<Arc<Notify>>>,
    status_calls: Mutex<Vec<String>>,
    upload_calls: AtomicUsize,
    quota_calls: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            uploads: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            quota: Mutex::new(Some(QuotaStatusDto::default())),
            upload_gate: Mutex::new(None),
            quota_gate: Mutex::new(None),
            status_calls: Mutex::new(Vec::new()),
            upload_calls: AtomicUsize::new(0),
            quota_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, receipt_id: Option<&str>) {
        let accepted: UploadAcceptedDto =
            serde_json::from_value(json!({ "receipt_id": receipt_id, "status": "uploaded" })).unwrap();
        self.uploads.lock().unwrap().push_back(Ok(accepted));
    }

    pub fn reject(&self, error: ApiError) {
        self.uploads.lock().unwrap().push_back(Err(error));
    }

    pub fn then_status(&self, step: StatusStep) {
        self.statuses.lock().unwrap().push_back(step);
    }

    pub fn set_quota(&self, quota: Option<QuotaStatusDto>) {
        *self.quota.lock().unwrap() = quota;
    }

    /// Makes the next uploads wait until the returned handle is notified.
    pub fn hold_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Makes the next quota lookup wait until the returned handle is notified.
    pub fn hold_quota(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.quota_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn quota_calls(&self) -> usize {
        self.quota_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReceiptGateway for ScriptedGateway {
    async fn upload(
        &self,
        _file: UploadFile,
        progress: Option<ProgressCallback>,
    ) -> ApplicationResult<UploadAcceptedDto> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(progress) = &progress {
            progress(40);
        }
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(progress) = &progress {
            progress(100);
        }
        let next = self.uploads.lock().unwrap().pop_front();
        match next {
            Some(Ok(accepted)) => Ok(accepted),
            Some(Err(error)) => Err(error.into()),
            None => Ok(serde_json::from_value(json!({ "receipt_id": "r-1" })).unwrap()),
        }
    }

    async fn upload_status(&self, receipt_id: &str) -> ApplicationResult<UploadStatusDto> {
        self.status_calls.lock().unwrap().push(receipt_id.to_owned());
        let step = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StatusStep::status("processing", Some(10.0)));
        match step {
            StatusStep::Status(status) => Ok(status),
            StatusStep::Unavailable => {
                let mut error = ApiError::new(ErrorKind::Network, format!("/status/{receipt_id}"));
                error.notified = true;
                Err(ApplicationError::from(error))
            }
        }
    }

    async fn quota_status(&self) -> ApplicationResult<QuotaStatusDto> {
        self.quota_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.quota_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.quota
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApplicationError::infrastructure("quota service unavailable"))
    }
}
