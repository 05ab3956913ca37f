// src/infrastructure/http.rs
use crate::application::ports::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ProgressCallback, RequestBody,
    TransportError,
};
use crate::domain::upload::UploadFile;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{
    Body, Client, Method,
    multipart::{Form, Part},
};
use std::time::Duration;
use tracing::trace;

const UPLOAD_CHUNK: usize = 64 * 1024;

/// [`HttpTransport`] over a shared `reqwest` client.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("receipt-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from((sent.saturating_mul(100) / total).min(100)).unwrap_or(100)
}

/// Streams the file in chunks so progress can be reported as the body is
/// written out.
fn multipart_form(
    field: String,
    file: UploadFile,
    progress: Option<ProgressCallback>,
) -> Result<Form, TransportError> {
    let total = file.size();
    let chunks: Vec<Result<Bytes, std::io::Error>> = (0..file.bytes.len())
        .step_by(UPLOAD_CHUNK)
        .map(|start| Ok(file.bytes.slice(start..(start + UPLOAD_CHUNK).min(file.bytes.len()))))
        .collect();
    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            sent += chunk.len() as u64;
            if let Some(progress) = &progress {
                progress(percent(sent, total));
            }
        }
    });
    let part = Part::stream_with_length(Body::wrap_stream(stream), total)
        .file_name(file.file_name)
        .mime_str(&file.content_type)
        .map_err(|err| TransportError::Other(format!("invalid content type: {err}")))?;
    Ok(Form::new().part(field, part))
}

fn transport_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method: verb,
            path,
            query,
            headers,
            body,
            upload_progress,
        } = request;
        let url = self.url(&path);
        trace!(method = %verb, url = %url, "sending request");

        let mut builder = self.client.request(method(verb), &url);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart { field, file } => {
                builder.multipart(multipart_form(field, file, upload_progress)?)
            }
        };

        let response = builder.send().await.map_err(|err| transport_error(&err))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response.bytes().await.map_err(|err| transport_error(&err))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_join_the_base_url() {
        let transport = ReqwestTransport::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.url("/api/auth/profile/"), "http://localhost:8000/api/auth/profile/");
        assert_eq!(transport.url("api/x"), "http://localhost:8000/api/x");
        assert_eq!(transport.url("https://cdn.example.com/a"), "https://cdn.example.com/a");
    }

    #[test]
    fn progress_is_a_bounded_percentage() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(100, 200), 50);
        assert_eq!(percent(250, 200), 100);
        assert_eq!(percent(0, 0), 100);
    }
}
