// tests/support/mocks/http.rs
use async_trait::async_trait;
use receipt_client_core::application::ports::http::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody, TransportError,
};
use serde_json::{Value, json};
use std::{collections::VecDeque, sync::Mutex, time::Duration};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn bearer(&self) -> Option<&str> {
        self.authorization.as_deref()?.strip_prefix("Bearer ")
    }
}

type Reply = Result<HttpResponse, TransportError>;

struct Route {
    method: HttpMethod,
    path: String,
    queued: VecDeque<Reply>,
    fallback: Option<Reply>,
    delay: Duration,
}

/// Answers requests from per-route scripts. Queued replies are used first,
/// then the route's standing reply. Unknown routes get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_route<F>(&self, method: HttpMethod, path: &str, update: F)
    where
        F: FnOnce(&mut Route),
    {
        let mut routes = self.routes.lock().unwrap();
        if let Some(route) = routes.iter_mut().find(|r| r.method == method && r.path == path) {
            update(route);
            return;
        }
        let mut route = Route {
            method,
            path: path.to_owned(),
            queued: VecDeque::new(),
            fallback: None,
            delay: Duration::ZERO,
        };
        update(&mut route);
        routes.push(route);
    }

    /// Standing reply for every request to the route.
    pub fn respond(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.with_route(method, path, |route| route.fallback = Some(Ok(response)));
    }

    /// Reply for the next request only.
    pub fn respond_once(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.with_route(method, path, |route| route.queued.push_back(Ok(response)));
    }

    pub fn fail_once(&self, method: HttpMethod, path: &str, error: TransportError) {
        self.with_route(method, path, |route| route.queued.push_back(Err(error)));
    }

    /// Holds every reply on the route for `delay` of (virtual) time.
    pub fn delay(&self, method: HttpMethod, path: &str, delay: Duration) {
        self.with_route(method, path, |route| route.delay = delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let body = match &request.body {
            RequestBody::Json(value) => Some(value.clone()),
            RequestBody::Multipart { field, file } => Some(json!({
                "field": field,
                "file_name": file.file_name,
                "content_type": file.content_type,
                "size": file.size(),
            })),
            RequestBody::Empty => None,
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            path: request.path.clone(),
            authorization: request.header_value("Authorization").map(str::to_owned),
            body,
        });
        if let Some(progress) = &request.upload_progress {
            progress(50);
            progress(100);
        }

        let (reply, delay) = {
            let mut routes = self.routes.lock().unwrap();
            match routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == request.path)
            {
                Some(route) => {
                    let reply = route.queued.pop_front().or_else(|| route.fallback.clone());
                    (reply, route.delay)
                }
                None => (None, Duration::ZERO),
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply.unwrap_or_else(|| {
            Ok(HttpResponse::json(
                404,
                &json!({ "error": { "code": "not_found", "message": "no scripted reply" } }),
            ))
        })
    }
}
