// src/application/pipeline/client.rs
use crate::application::{
    ApplicationError, ApplicationResult,
    dto::{DataEnvelope, RefreshDto},
    pipeline::inbound::ResponseInterceptor,
    ports::{
        http::{HttpRequest, HttpResponse, HttpTransport},
        time::Clock,
    },
    refresh::{RefreshCoordinator, RefreshOutcome},
    session::SessionStore,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Every HTTP call goes through here: bearer attachment and proactive refresh
/// on the way out, normalization and global side effects on the way back.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionStore>,
    refresh: RefreshCoordinator,
    inbound: ResponseInterceptor,
    clock: Arc<dyn Clock>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionStore>,
        inbound: ResponseInterceptor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            session,
            refresh: RefreshCoordinator::new(),
            inbound,
            clock,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.is_refreshing()
    }

    pub async fn send(&self, request: HttpRequest) -> ApplicationResult<HttpResponse> {
        let request = self.authorize(request).await;
        self.dispatch(request).await
    }

    /// Sends `request` and decodes the `data` member of the response body.
    pub async fn send_data<T: DeserializeOwned>(&self, request: HttpRequest) -> ApplicationResult<T> {
        let response = self.send(request).await?;
        decode_data(&response)
    }

    async fn authorize(&self, request: HttpRequest) -> HttpRequest {
        let config = self.inbound.config();
        if config.is_public(&request.path) {
            debug!(url = %request.path, "public endpoint; no bearer token");
            return request;
        }

        let session = self.session.snapshot();
        let Some(access_token) = session.access_token.as_deref() else {
            debug!(url = %request.path, "no access token; sending unauthenticated");
            return request;
        };

        let refresh_due = config.auto_refresh
            && !config.is_refresh_endpoint(&request.path)
            && session.can_refresh()
            && session.refresh_due(self.clock.now(), config.refresh_threshold);
        if !refresh_due {
            return request.bearer(access_token);
        }

        debug!(url = %request.path, "access token near expiry; refreshing first");
        match self.refresh.run(|| self.refresh_if_due()).await {
            RefreshOutcome::Refreshed(token) => request.bearer(&token),
            RefreshOutcome::Failed => match self.session.access_token() {
                Some(current) => request.bearer(&current),
                None => request,
            },
        }
    }

    async fn dispatch(&self, request: HttpRequest) -> ApplicationResult<HttpResponse> {
        let path = request.path.clone();
        let method = request.method;
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => {
                debug!(%method, url = %path, status = response.status, "request succeeded");
                Ok(response)
            }
            Ok(response) => Err(self.inbound.reject(&path, &response).into()),
            Err(err) => Err(self.inbound.reject_transport(&path, &err).into()),
        }
    }

    /// Runs as the single refresh leader, against the session as it is now.
    async fn refresh_if_due(&self) -> ApplicationResult<String> {
        let session = self.session.snapshot();
        let threshold = self.inbound.config().refresh_threshold;
        let due = session.refresh_due(self.clock.now(), threshold);
        match session.access_token {
            Some(access) if !due => {
                debug!("access token already renewed; skipping refresh");
                return Ok(access);
            }
            _ => {}
        }
        let Some(refresh_token) = session.refresh_token else {
            return Err(ApplicationError::unauthorized("no refresh token"));
        };
        self.refresh_access_token(refresh_token).await
    }

    /// Exchanges the refresh token for new tokens. Goes straight to
    /// [`Self::dispatch`]; the refresh endpoint is public.
    async fn refresh_access_token(&self, refresh_token: String) -> ApplicationResult<String> {
        let path = self.inbound.config().refresh_path.clone();
        let request = HttpRequest::post(path).json(json!({ "refresh": refresh_token }));
        let response = self.dispatch(request).await?;
        let RefreshDto { tokens } = decode_data(&response)?;
        let access = tokens.access.clone();
        self.session.apply_refreshed_tokens(tokens)?;
        info!("access token refreshed");
        Ok(access)
    }
}

pub fn decode_data<T: DeserializeOwned>(response: &HttpResponse) -> ApplicationResult<T> {
    response
        .decode::<DataEnvelope<T>>()
        .map(|envelope| envelope.data)
        .map_err(|err| ApplicationError::infrastructure(format!("unexpected response body: {err}")))
}
