// src/application/pipeline/classify.rs
use crate::application::{
    error::{ApiError, ErrorKind},
    pipeline::config::PipelineConfig,
    ports::http::{HttpResponse, TransportError},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::SystemTime;

#[derive(Debug, Default, Deserialize)]
struct NestedError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    context: Option<Value>,
    #[serde(default)]
    correlation_id: Option<String>,
}

/// Error bodies the API is known to produce.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorEnvelope {
    Nested {
        error: NestedError,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        detail: Option<Value>,
        #[serde(default)]
        message: Option<String>,
    },
    Flat {
        code: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        detail: Option<Value>,
    },
    Plain {
        error: String,
    },
    Detail {
        detail: Value,
    },
    Message {
        message: String,
    },
}

/// Fields extracted from an error body, whatever its shape.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
    pub context: Option<Value>,
    pub correlation_id: Option<String>,
}

impl ErrorBody {
    pub fn parse(body: &[u8]) -> Self {
        let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) else {
            return Self::default();
        };
        match envelope {
            ErrorEnvelope::Nested {
                error,
                code,
                detail,
                message,
            } => Self {
                code: error.code.or(code).or(error.error_type),
                message: error
                    .message
                    .or_else(|| detail.as_ref().and_then(text))
                    .or(message),
                context: error.context,
                correlation_id: error.correlation_id,
            },
            ErrorEnvelope::Flat {
                code,
                message,
                detail,
            } => Self {
                code: Some(code),
                message: detail.as_ref().and_then(text).or(message),
                ..Self::default()
            },
            ErrorEnvelope::Plain { error } => Self {
                message: Some(error),
                ..Self::default()
            },
            ErrorEnvelope::Detail { detail } => Self {
                message: text(&detail),
                ..Self::default()
            },
            ErrorEnvelope::Message { message } => Self {
                message: Some(message),
                ..Self::default()
            },
        }
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Maps a failed response to its error class. 401 is decided by URL before
/// anything else; silent codes win over every other status.
pub fn classify(status: u16, path: &str, code: Option<&str>, config: &PipelineConfig) -> ErrorKind {
    if status == 401 {
        return if config.is_refresh_endpoint(path) {
            ErrorKind::AuthInvalid
        } else {
            ErrorKind::AuthExpired
        };
    }
    if code.is_some_and(|code| config.silent_codes.contains(code)) {
        return ErrorKind::Silent;
    }
    match status {
        400 => ErrorKind::Validation,
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        413 => ErrorKind::PayloadTooLarge,
        429 => ErrorKind::RateLimited,
        s if s >= 500 => ErrorKind::ServerError,
        _ => ErrorKind::Unclassified,
    }
}

/// `Retry-After` as delta-seconds or an HTTP-date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(
        at.duration_since(SystemTime::from(now))
            .map_or(0, |wait| wait.as_secs()),
    )
}

/// Normalizes a non-2xx response into an [`ApiError`].
pub fn error_from_response(
    path: &str,
    response: &HttpResponse,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> ApiError {
    let body = ErrorBody::parse(&response.body);
    let kind = classify(response.status, path, body.code.as_deref(), config);
    let mut error = ApiError::new(kind, path);
    error.status = Some(response.status);
    error.code = body.code;
    error.message = body.message;
    error.context = body.context;
    error.correlation_id = body
        .correlation_id
        .or_else(|| response.header("x-correlation-id").map(str::to_owned));
    if response.status == 429 {
        error.retry_after = error
            .context_str("retry_after")
            .and_then(|value| value.parse().ok())
            .or_else(|| {
                response
                    .header("retry-after")
                    .and_then(|value| parse_retry_after(value, now))
            });
    }
    error
}

pub fn error_from_transport(path: &str, err: &TransportError) -> ApiError {
    let mut error = ApiError::new(ErrorKind::Network, path);
    if matches!(err, TransportError::Timeout) {
        error.code = Some("timeout".to_owned());
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pipeline::config::SilentErrorCodes;
    use serde_json::json;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn parses_nested_envelope() {
        let body = ErrorBody::parse(
            json!({"error": {
                "code": "duplicate_receipt",
                "message": "Already uploaded",
                "context": {"existing_receipt_id": "r0"},
                "correlation_id": "c-1"
            }})
            .to_string()
            .as_bytes(),
        );
        assert_eq!(body.code.as_deref(), Some("duplicate_receipt"));
        assert_eq!(body.message.as_deref(), Some("Already uploaded"));
        assert_eq!(body.context, Some(json!({"existing_receipt_id": "r0"})));
        assert_eq!(body.correlation_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn nested_type_is_code_fallback_and_detail_is_message_fallback() {
        let body = ErrorBody::parse(
            json!({"error": {"type": "throttled"}, "detail": "Slow down"})
                .to_string()
                .as_bytes(),
        );
        assert_eq!(body.code.as_deref(), Some("throttled"));
        assert_eq!(body.message.as_deref(), Some("Slow down"));
    }

    #[test]
    fn parses_flat_and_detail_envelopes() {
        let flat = ErrorBody::parse(br#"{"code":"quota_exceeded","message":"No uploads left"}"#);
        assert_eq!(flat.code.as_deref(), Some("quota_exceeded"));
        assert_eq!(flat.message.as_deref(), Some("No uploads left"));

        let detail = ErrorBody::parse(br#"{"detail":"Not found."}"#);
        assert!(detail.code.is_none());
        assert_eq!(detail.message.as_deref(), Some("Not found."));
    }

    #[test]
    fn garbage_bodies_normalize_to_empty() {
        assert_eq!(ErrorBody::parse(b"<html>502</html>"), ErrorBody::default());
        assert_eq!(ErrorBody::parse(b""), ErrorBody::default());
    }

    #[test]
    fn unauthorized_is_classified_by_url() {
        let config = config();
        assert_eq!(
            classify(401, "/auth/v1/token/refresh/", None, &config),
            ErrorKind::AuthInvalid
        );
        assert_eq!(
            classify(401, "/auth/v1/profile/", None, &config),
            ErrorKind::AuthExpired
        );
        assert_eq!(
            classify(401, "/auth/v1/profile/", Some("duplicate_receipt"), &config),
            ErrorKind::AuthExpired
        );
    }

    #[test]
    fn silent_codes_override_status() {
        let config = config();
        assert_eq!(classify(409, "/x", Some("duplicate_receipt"), &config), ErrorKind::Silent);
        assert_eq!(classify(500, "/x", Some("receipt_not_processed"), &config), ErrorKind::Silent);
        assert_eq!(classify(409, "/x", Some("other"), &config), ErrorKind::Conflict);

        let custom = PipelineConfig {
            silent_codes: SilentErrorCodes::from_codes(["other"]),
            ..PipelineConfig::default()
        };
        assert_eq!(classify(409, "/x", Some("other"), &custom), ErrorKind::Silent);
        assert_eq!(classify(409, "/x", Some("duplicate_receipt"), &custom), ErrorKind::Conflict);
    }

    #[test]
    fn status_table() {
        let config = config();
        let cases = [
            (400, ErrorKind::Validation),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (413, ErrorKind::PayloadTooLarge),
            (429, ErrorKind::RateLimited),
            (503, ErrorKind::ServerError),
            (418, ErrorKind::Unclassified),
        ];
        for (status, expected) in cases {
            assert_eq!(classify(status, "/x", None, &config), expected, "status {status}");
        }
    }

    #[test]
    fn retry_after_accepts_seconds_and_dates() {
        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_retry_after("120", now), Some(120));
        assert_eq!(parse_retry_after("Wed, 01 Jan 2025 00:01:30 GMT", now), Some(90));
        assert_eq!(parse_retry_after("Tue, 31 Dec 2024 23:00:00 GMT", now), Some(0));
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn rate_limit_prefers_context_over_header() {
        let now = Utc::now();
        let response = HttpResponse::json(
            429,
            &json!({"error": {"code": "rate_limited", "context": {"retry_after": 15}}}),
        )
        .with_header("Retry-After", "60");
        let err = error_from_response("/x", &response, &config(), now);
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.retry_after, Some(15));

        let header_only = HttpResponse::new(429, "").with_header("Retry-After", "60");
        let err = error_from_response("/x", &header_only, &config(), now);
        assert_eq!(err.retry_after, Some(60));
    }
}
