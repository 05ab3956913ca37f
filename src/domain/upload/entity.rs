// src/domain/upload/entity.rs
use crate::domain::errors::{DomainError, DomainResult};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UploadStage {
    #[default]
    Select,
    Uploading,
    Processing,
    Complete,
    Failed,
}

impl UploadStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pass through the upload flow, from file selection to review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSession {
    pub receipt_id: Option<String>,
    pub stage: UploadStage,
    pub upload_progress: u8,
    pub processing_progress: u8,
    pub current_phase: Option<String>,
    pub poll_attempts: u32,
    pub last_error: Option<String>,
}

impl UploadSession {
    /// Starts a fresh upload. Any previous receipt id is dropped first so a
    /// late response for an older upload cannot be mistaken for this one.
    pub fn begin_upload(&mut self) {
        *self = Self {
            stage: UploadStage::Uploading,
            ..Self::default()
        };
    }

    pub fn set_upload_progress(&mut self, percent: u8) {
        if self.stage == UploadStage::Uploading {
            self.upload_progress = percent.min(100);
        }
    }

    pub fn enter_processing(&mut self, receipt_id: impl Into<String>) -> DomainResult<()> {
        let receipt_id = receipt_id.into();
        if receipt_id.trim().is_empty() {
            return Err(DomainError::Validation("receipt id cannot be empty".into()));
        }
        if self.stage != UploadStage::Uploading {
            return Err(DomainError::InvalidTransition(format!(
                "cannot start processing from {}",
                self.stage
            )));
        }
        self.receipt_id = Some(receipt_id);
        self.stage = UploadStage::Processing;
        self.upload_progress = 100;
        self.processing_progress = 0;
        self.poll_attempts = 0;
        Ok(())
    }

    pub fn is_polling(&self) -> bool {
        self.stage == UploadStage::Processing && self.receipt_id.is_some()
    }

    pub fn record_poll_attempt(&mut self) -> u32 {
        self.poll_attempts += 1;
        self.poll_attempts
    }

    pub fn record_processing(&mut self, progress: Option<u8>, phase: Option<String>) {
        if let Some(progress) = progress {
            self.processing_progress = progress.min(100);
        }
        if phase.is_some() {
            self.current_phase = phase;
        }
    }

    pub fn complete(&mut self) -> DomainResult<()> {
        if self.stage != UploadStage::Processing {
            return Err(DomainError::InvalidTransition(format!(
                "cannot complete from {}",
                self.stage
            )));
        }
        self.stage = UploadStage::Complete;
        self.processing_progress = 100;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.stage = UploadStage::Failed;
        self.last_error = Some(message.into());
    }

    /// Back to file selection. The last error survives so the view can show it.
    pub fn reset(&mut self) {
        let last_error = self.last_error.take();
        *self = Self {
            last_error,
            ..Self::default()
        };
    }
}
