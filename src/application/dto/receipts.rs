// src/application/dto/receipts.rs
use crate::domain::upload::ReceiptStatus;
use serde::{Deserialize, Deserializer};

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(value)) if !value.trim().is_empty() => Some(value),
        Some(RawId::Number(value)) => Some(value.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadAcceptedDto {
    #[serde(default, deserialize_with = "optional_id")]
    pub receipt_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadStatusDto {
    pub status: String,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl UploadStatusDto {
    pub fn status(&self) -> ReceiptStatus {
        ReceiptStatus::normalize(&self.status)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn progress(&self) -> Option<u8> {
        self.progress_percentage
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 100.0).round() as u8)
    }

    pub fn is_complete(&self) -> bool {
        self.status().is_processed() || self.progress() == Some(100)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuotaStatusDto {
    #[serde(default)]
    pub quota_exceeded: bool,
    #[serde(default)]
    pub current_month_uploads: Option<u32>,
    #[serde(default)]
    pub monthly_limit: Option<u32>,
    #[serde(default)]
    pub remaining_uploads: Option<u32>,
    #[serde(default)]
    pub reset_date: Option<String>,
    #[serde(default)]
    pub utilization_percentage: Option<f64>,
}

impl QuotaStatusDto {
    pub fn exceeded_message(&self) -> String {
        let used = self
            .current_month_uploads
            .map_or_else(|| "?".to_owned(), |v| v.to_string());
        let limit = self.monthly_limit.map_or_else(|| "?".to_owned(), |v| v.to_string());
        let reset = self.reset_date.as_deref().unwrap_or("next month");
        format!("Monthly upload limit reached ({used}/{limit}). Resets on {reset}")
    }
}
