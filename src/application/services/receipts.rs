// src/application/services/receipts.rs
use crate::application::{
    ApplicationResult,
    dto::{QuotaStatusDto, UploadAcceptedDto, UploadStatusDto},
    endpoints,
    pipeline::ApiClient,
    ports::{
        cache::{CacheInvalidator, CacheScope},
        http::{HttpRequest, ProgressCallback},
        receipts::ReceiptGateway,
        time::Clock,
    },
};
use crate::domain::upload::UploadFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tracing::debug;

const UPLOAD_FIELD: &str = "file";

struct Cached<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

/// Receipt upload, lookup and review endpoints with short-lived caches for
/// quota and list reads.
pub struct ReceiptService {
    client: Arc<ApiClient>,
    clock: Arc<dyn Clock>,
    quota_ttl: Duration,
    list_ttl: Duration,
    quota: Mutex<Option<Cached<QuotaStatusDto>>>,
    lists: Mutex<HashMap<String, Cached<Value>>>,
}

impl ReceiptService {
    pub fn new(
        client: Arc<ApiClient>,
        clock: Arc<dyn Clock>,
        quota_ttl: Duration,
        list_ttl: Duration,
    ) -> Self {
        Self {
            client,
            clock,
            quota_ttl,
            list_ttl,
            quota: Mutex::new(None),
            lists: Mutex::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>, ttl: Duration) -> bool {
        let age = self.clock.now() - fetched_at;
        age.to_std().is_ok_and(|age| age < ttl)
    }

    pub async fn upload(
        &self,
        file: UploadFile,
        progress: Option<ProgressCallback>,
    ) -> ApplicationResult<UploadAcceptedDto> {
        debug!(file = %file.file_name, size = file.size(), "uploading receipt");
        let mut request = HttpRequest::post(endpoints::RECEIPT_UPLOAD).multipart(UPLOAD_FIELD, file);
        if let Some(progress) = progress {
            request = request.with_upload_progress(progress);
        }
        self.client.send_data(request).await
    }

    pub async fn upload_status(&self, receipt_id: &str) -> ApplicationResult<UploadStatusDto> {
        self.client
            .send_data(HttpRequest::get(endpoints::upload_status(receipt_id)))
            .await
    }

    pub async fn details(&self, receipt_id: &str) -> ApplicationResult<Value> {
        self.client
            .send_data(HttpRequest::get(endpoints::receipt_detail(receipt_id)))
            .await
    }

    pub async fn extracted_data(&self, receipt_id: &str) -> ApplicationResult<Value> {
        self.client
            .send_data(HttpRequest::get(endpoints::extracted_data(receipt_id)))
            .await
    }

    pub async fn confirm(&self, receipt_id: &str, confirmation: Value) -> ApplicationResult<Value> {
        let confirmed = self
            .client
            .send_data(HttpRequest::post(endpoints::confirm_receipt(receipt_id)).json(confirmation))
            .await?;
        self.invalidate(CacheScope::ReceiptList);
        Ok(confirmed)
    }

    /// Lists receipts. Identical queries inside the list TTL are served from
    /// cache.
    pub async fn list(&self, params: &[(String, String)]) -> ApplicationResult<Value> {
        let key = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        {
            let lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = lists.get(&key) {
                if self.is_fresh(cached.fetched_at, self.list_ttl) {
                    return Ok(cached.value.clone());
                }
            }
        }
        let request = params
            .iter()
            .fold(HttpRequest::get(endpoints::RECEIPT_LIST), |request, (k, v)| {
                request.query(k.as_str(), v.as_str())
            });
        let value: Value = self.client.send_data(request).await?;
        self.lists.lock().unwrap_or_else(PoisonError::into_inner).insert(
            key,
            Cached {
                value: value.clone(),
                fetched_at: self.clock.now(),
            },
        );
        Ok(value)
    }

    pub async fn quota_status(&self) -> ApplicationResult<QuotaStatusDto> {
        {
            let quota = self.quota.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = quota.as_ref() {
                if self.is_fresh(cached.fetched_at, self.quota_ttl) {
                    return Ok(cached.value.clone());
                }
            }
        }
        let status: QuotaStatusDto = self
            .client
            .send_data(HttpRequest::get(endpoints::QUOTA_STATUS))
            .await?;
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner) = Some(Cached {
            value: status.clone(),
            fetched_at: self.clock.now(),
        });
        Ok(status)
    }

    pub async fn upload_history(&self, months: u32) -> ApplicationResult<Value> {
        self.client
            .send_data(HttpRequest::get(endpoints::UPLOAD_HISTORY).query("months", months.to_string()))
            .await
    }
}

impl CacheInvalidator for ReceiptService {
    fn invalidate(&self, scope: CacheScope) {
        debug!(?scope, "invalidating cache");
        match scope {
            CacheScope::Quota => {
                self.quota.lock().unwrap_or_else(PoisonError::into_inner).take();
            }
            CacheScope::ReceiptList => {
                self.lists.lock().unwrap_or_else(PoisonError::into_inner).clear();
            }
        }
    }
}

#[async_trait]
impl ReceiptGateway for ReceiptService {
    async fn upload(
        &self,
        file: UploadFile,
        progress: Option<ProgressCallback>,
    ) -> ApplicationResult<UploadAcceptedDto> {
        ReceiptService::upload(self, file, progress).await
    }

    async fn upload_status(&self, receipt_id: &str) -> ApplicationResult<UploadStatusDto> {
        ReceiptService::upload_status(self, receipt_id).await
    }

    async fn quota_status(&self) -> ApplicationResult<QuotaStatusDto> {
        ReceiptService::quota_status(self).await
    }
}
