// src/domain/upload/status.rs
use std::fmt;

/// Server-side processing status of a receipt, normalized from the raw string
/// reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    Uploaded,
    Queued,
    Processing,
    Processed,
    Confirmed,
    Failed,
    Cancelled,
    Other(String),
}

impl ReceiptStatus {
    pub fn normalize(raw: &str) -> Self {
        let value = raw.trim().to_ascii_lowercase();
        match value.as_str() {
            "uploaded" => Self::Uploaded,
            "queued" | "pending" => Self::Queued,
            "processing" => Self::Processing,
            "processed" | "completed" => Self::Processed,
            "confirmed" => Self::Confirmed,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Other(value) => value,
        }
    }

    /// Extraction finished; the receipt can be reviewed.
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed | Self::Confirmed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
