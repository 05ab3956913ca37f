// src/application/pipeline/config.rs
use crate::application::endpoints;
use std::{collections::BTreeSet, time::Duration};

pub const DUPLICATE_RECEIPT: &str = "duplicate_receipt";
pub const RECEIPT_PROCESSING_IN_PROGRESS: &str = "receipt_processing_in_progress";
pub const RECEIPT_NOT_PROCESSED: &str = "receipt_not_processed";
/// Generic 400 code whose field errors are for the caller to render.
pub const VALIDATION_ERROR: &str = "validation_error";

/// Error codes the caller handles itself; the pipeline never notifies for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilentErrorCodes(BTreeSet<String>);

impl Default for SilentErrorCodes {
    fn default() -> Self {
        Self::from_codes([DUPLICATE_RECEIPT, RECEIPT_PROCESSING_IN_PROGRESS, RECEIPT_NOT_PROCESSED])
    }
}

impl SilentErrorCodes {
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            codes
                .into_iter()
                .map(|code| code.as_ref().trim().to_owned())
                .filter(|code| !code.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Substrings identifying endpoints that must not carry a bearer token.
    pub public_paths: Vec<String>,
    pub refresh_path: String,
    pub auto_refresh: bool,
    pub refresh_threshold: chrono::Duration,
    pub silent_codes: SilentErrorCodes,
    pub session_redirect_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            public_paths: endpoints::PUBLIC_PATHS.iter().map(|p| (*p).to_owned()).collect(),
            refresh_path: endpoints::TOKEN_REFRESH.to_owned(),
            auto_refresh: true,
            refresh_threshold: chrono::Duration::seconds(300),
            silent_codes: SilentErrorCodes::default(),
            session_redirect_delay: Duration::from_millis(500),
        }
    }
}

impl PipelineConfig {
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| path.contains(public.as_str()))
    }

    pub fn is_refresh_endpoint(&self, path: &str) -> bool {
        path.contains(self.refresh_path.as_str())
    }
}
