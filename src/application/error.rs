// src/application/error.rs
use crate::domain::errors::DomainError;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type ApplicationResult<T> = Result<T, ApplicationError>;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Self::Infrastructure(msg.into())
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Whether a global notification was already shown for this error.
    pub fn was_notified(&self) -> bool {
        self.as_api().is_some_and(|err| err.notified)
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message().to_owned(),
            Self::Domain(DomainError::Validation(msg)) | Self::Validation(msg) => msg.clone(),
            Self::Unauthorized(msg) => msg.clone(),
            Self::Domain(_) | Self::Infrastructure(_) => "An unexpected error occurred.".to_owned(),
        }
    }
}

/// Classification of a failed HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 401 on any endpoint other than token refresh; the session is gone.
    AuthExpired,
    /// 401 from the refresh endpoint itself.
    AuthInvalid,
    Validation,
    Forbidden,
    NotFound,
    Conflict,
    RateLimited,
    PayloadTooLarge,
    ServerError,
    Network,
    Unclassified,
    /// A caller-handled condition whose error code is on the silent list.
    Silent,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthExpired => "auth-expired",
            Self::AuthInvalid => "auth-invalid",
            Self::Validation => "validation",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate-limited",
            Self::PayloadTooLarge => "payload-too-large",
            Self::ServerError => "server-error",
            Self::Network => "network-error",
            Self::Unclassified => "unclassified",
            Self::Silent => "silent",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized HTTP failure. Every error leaving the request pipeline has
/// this shape regardless of which envelope the server used.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub context: Option<Value>,
    pub correlation_id: Option<String>,
    pub url: String,
    pub retry_after: Option<u64>,
    pub notified: bool,
}

impl ApiError {
    pub fn new(kind: ErrorKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: None,
            context: None,
            correlation_id: None,
            url: url.into(),
            retry_after: None,
            notified: false,
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }

    /// A context entry rendered as text; numbers are stringified.
    pub fn context_str(&self, key: &str) -> Option<String> {
        match self.context_value(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn user_message(&self) -> &str {
        self.message.as_deref().unwrap_or(match self.kind {
            ErrorKind::AuthExpired | ErrorKind::AuthInvalid => {
                "Your session has expired. Please login again."
            }
            ErrorKind::Validation => "Invalid request. Please check your input.",
            ErrorKind::Forbidden => "Access denied.",
            ErrorKind::RateLimited => "Too many requests. Please try again later.",
            ErrorKind::PayloadTooLarge => "File size exceeds the maximum limit of 10MB.",
            ErrorKind::ServerError => "Server error occurred. Please try again.",
            ErrorKind::Network => "Network error. Please check your connection.",
            ErrorKind::NotFound
            | ErrorKind::Conflict
            | ErrorKind::Unclassified
            | ErrorKind::Silent => "An error occurred. Please try again.",
        })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        write!(f, " for {}", self.url)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        write!(f, ": {}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_includes_kind_status_and_code() {
        let mut err = ApiError::new(ErrorKind::Conflict, "/receipt/v1/receipts/upload/");
        err.status = Some(409);
        err.code = Some("duplicate_receipt".into());
        err.message = Some("Already uploaded".into());
        assert_eq!(
            err.to_string(),
            "conflict error (409) for /receipt/v1/receipts/upload/ [duplicate_receipt]: Already uploaded"
        );
    }

    #[test]
    fn context_values_render_as_text() {
        let mut err = ApiError::new(ErrorKind::RateLimited, "/x");
        err.context = Some(json!({"retry_after": 30, "reset_date": "2025-02-01"}));
        assert_eq!(err.context_str("retry_after").as_deref(), Some("30"));
        assert_eq!(err.context_str("reset_date").as_deref(), Some("2025-02-01"));
        assert!(err.context_str("missing").is_none());
    }

    #[test]
    fn notified_flag_is_visible_through_application_error() {
        let mut err = ApiError::new(ErrorKind::ServerError, "/x");
        err.notified = true;
        let app: ApplicationError = err.into();
        assert!(app.was_notified());
        assert!(!ApplicationError::validation("bad").was_notified());
    }
}
