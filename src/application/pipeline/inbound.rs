// src/application/pipeline/inbound.rs
use crate::application::{
    error::{ApiError, ErrorKind},
    pipeline::{
        classify::{error_from_response, error_from_transport},
        config::{PipelineConfig, VALIDATION_ERROR},
    },
    ports::{
        http::{HttpResponse, TransportError},
        navigation::{Navigator, Route},
        notify::{Notification, Notifier},
        time::Clock,
    },
    session::SessionStore,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

const LONG_TOAST: Duration = Duration::from_secs(8);

/// Turns failed exchanges into [`ApiError`]s and applies the one global side
/// effect each class calls for.
pub struct ResponseInterceptor {
    config: PipelineConfig,
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    redirect_pending: Arc<AtomicBool>,
}

impl ResponseInterceptor {
    pub fn new(
        config: PipelineConfig,
        session: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            session,
            notifier,
            navigator,
            clock,
            redirect_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn reject(&self, path: &str, response: &HttpResponse) -> ApiError {
        let mut error = error_from_response(path, response, &self.config, self.clock.now());
        self.apply(&mut error);
        error
    }

    pub fn reject_transport(&self, path: &str, err: &TransportError) -> ApiError {
        warn!(url = %path, error = %err, "request failed without a response");
        let mut error = error_from_transport(path, err);
        self.apply(&mut error);
        error
    }

    fn apply(&self, error: &mut ApiError) {
        let url = error.url.clone();
        let status = error.status.unwrap_or_default();
        let code = error.code.clone().unwrap_or_default();

        match error.kind {
            ErrorKind::AuthInvalid => {
                debug!(url = %url, "refresh endpoint rejected credentials");
            }
            ErrorKind::AuthExpired => {
                warn!(url = %url, "session expired; signing out");
                self.post(
                    error,
                    Notification::warning("Your session has expired. Please login again."),
                );
                if let Err(err) = self.session.logout() {
                    error!(error = %err, "failed to clear expired session");
                }
                self.schedule_login_redirect();
            }
            ErrorKind::Silent => {
                debug!(url = %url, status, code = %code, "silent error left to caller");
            }
            ErrorKind::RateLimited => {
                let mut message = error.user_message().to_owned();
                if let Some(reset) = error.context_str("reset_date") {
                    message.push_str(&format!(" Quota resets on {reset}."));
                } else if let Some(wait) = error.retry_after {
                    message.push_str(&format!(" Please wait {wait} seconds."));
                }
                warn!(url = %url, code = %code, retry_after = ?error.retry_after, "rate limited");
                self.post(error, Notification::warning(message).lasting(LONG_TOAST));
            }
            ErrorKind::Validation if code == VALIDATION_ERROR && error.context.is_some() => {
                info!(url = %url, context = ?error.context, "validation errors returned to caller");
            }
            ErrorKind::Validation | ErrorKind::Forbidden | ErrorKind::PayloadTooLarge => {
                warn!(url = %url, status, code = %code, "request rejected");
                let message = error.user_message().to_owned();
                self.post(error, Notification::error(message));
            }
            ErrorKind::NotFound => {
                info!(url = %url, "resource not found");
            }
            ErrorKind::Conflict => {
                info!(url = %url, code = %code, "conflict");
            }
            ErrorKind::ServerError => {
                let mut message = error.user_message().to_owned();
                if let Some(id) = &error.correlation_id {
                    message.push_str(&format!(" (ID: {id})"));
                }
                error!(url = %url, status, correlation_id = ?error.correlation_id, "server error");
                self.post(error, Notification::error(message).lasting(LONG_TOAST));
            }
            ErrorKind::Network => {
                self.post(error, Notification::error("Network error. Please check your connection."));
            }
            ErrorKind::Unclassified => {
                warn!(url = %url, status, code = %code, "unexpected error response");
                let message = error.user_message().to_owned();
                self.post(error, Notification::error(message));
            }
        }
    }

    fn post(&self, error: &mut ApiError, notification: Notification) {
        self.notifier.notify(notification);
        error.notified = true;
    }

    /// Concurrent 401s collapse into one pending redirect.
    fn schedule_login_redirect(&self) {
        if self.redirect_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        let navigator = Arc::clone(&self.navigator);
        let pending = Arc::clone(&self.redirect_pending);
        let delay = self.config.session_redirect_delay;
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    pending.store(false, Ordering::SeqCst);
                    navigator.navigate(Route::Login);
                });
            }
            Err(_) => {
                pending.store(false, Ordering::SeqCst);
                navigator.navigate(Route::Login);
            }
        }
    }
}
