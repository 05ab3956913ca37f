// src/application/upload/controller.rs
use crate::application::{
    ApplicationError, ApplicationResult,
    pipeline::config::DUPLICATE_RECEIPT,
    ports::{
        cache::{CacheInvalidator, CacheScope},
        http::ProgressCallback,
        navigation::{Navigator, Route},
        notify::{Notification, Notifier},
        receipts::ReceiptGateway,
    },
};
use crate::domain::upload::{UploadFile, UploadLimits, UploadSession, UploadStage};
use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

pub const SUCCESS_MESSAGE: &str = "Receipt processed successfully!";
pub const FAILED_MESSAGE: &str = "Receipt processing failed. Please try again.";
pub const SLOW_MESSAGE: &str =
    "Processing is taking longer than expected. You can check the receipt status in your receipts list.";
pub const STATUS_UNAVAILABLE_MESSAGE: &str =
    "Unable to check processing status. Please check your receipts list.";
pub const MISSING_ID_MESSAGE: &str = "Upload succeeded but no receipt ID received.";
pub const UPLOAD_FAILED_MESSAGE: &str = "Failed to upload receipt. Please try again.";
pub const DUPLICATE_MESSAGE: &str = "This receipt has already been uploaded.";

const LONG_TOAST: Duration = Duration::from_secs(8);
const LONGER_TOAST: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Pause between completion and the move to the review screen.
    pub review_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 40,
            review_delay: Duration::from_millis(1500),
        }
    }
}

impl PollingConfig {
    /// Derives the attempt bound from a total polling budget.
    pub fn from_budget(interval: Duration, max_duration: Duration, review_delay: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let attempts = max_duration.as_millis() / interval.as_millis();
        Self {
            interval,
            max_attempts: u32::try_from(attempts).unwrap_or(u32::MAX).max(1),
            review_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The server accepted the file and polling has started.
    Processing { receipt_id: String },
    /// The same receipt was uploaded before.
    Duplicate {
        existing_receipt_id: Option<String>,
        message: String,
    },
    /// The upload was cancelled or replaced by a newer one before it finished.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Continue,
    Stop,
}

/// Drives one upload from file selection through server-side processing.
///
/// At most one status poller exists at a time and it only runs while the
/// session is processing a known receipt. Every exit path (completion,
/// failure, exhaustion, cancel, drop) stops it.
pub struct UploadController {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn ReceiptGateway>,
    cache: Arc<dyn CacheInvalidator>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    config: PollingConfig,
    limits: UploadLimits,
    state: Mutex<UploadSession>,
    // Bumped whenever the current upload is abandoned; stale work compares it.
    epoch: AtomicU64,
    poller: Mutex<Option<JoinHandle<()>>>,
    pending_navigation: Mutex<Option<JoinHandle<()>>>,
    snapshots: watch::Sender<UploadSession>,
    stages: broadcast::Sender<UploadStage>,
}

impl UploadController {
    pub fn new(
        gateway: Arc<dyn ReceiptGateway>,
        cache: Arc<dyn CacheInvalidator>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        config: PollingConfig,
        limits: UploadLimits,
    ) -> Self {
        let (snapshots, _) = watch::channel(UploadSession::default());
        let (stages, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(Inner {
                gateway,
                cache,
                notifier,
                navigator,
                config,
                limits,
                state: Mutex::new(UploadSession::default()),
                epoch: AtomicU64::new(0),
                poller: Mutex::new(None),
                pending_navigation: Mutex::new(None),
                snapshots,
                stages,
            }),
        }
    }

    pub fn snapshot(&self) -> UploadSession {
        self.inner.lock_state().clone()
    }

    pub fn watch(&self) -> watch::Receiver<UploadSession> {
        self.inner.snapshots.subscribe()
    }

    /// Every stage transition, in order.
    pub fn stages(&self) -> broadcast::Receiver<UploadStage> {
        self.inner.stages.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Validates and uploads `file`, then starts polling its processing
    /// status.
    ///
    /// File rule violations come back as validation errors for the caller to
    /// display. Every other failure has already been shown to the user by the
    /// time this returns.
    pub async fn start_upload(&self, file: UploadFile) -> ApplicationResult<UploadOutcome> {
        let inner = &self.inner;
        inner.limits.check(&file)?;
        let epoch = inner.supersede();
        inner.ensure_quota().await?;
        if !inner.is_epoch(epoch) {
            debug!("upload superseded during the quota check");
            return Ok(UploadOutcome::Superseded);
        }

        inner.begin_upload();
        info!(file = %file.file_name, size = file.size(), "upload started");
        let progress: ProgressCallback = {
            let weak = Arc::downgrade(inner);
            Arc::new(move |percent| {
                if let Some(inner) = weak.upgrade() {
                    inner.record_upload_progress(epoch, percent);
                }
            })
        };

        let result = inner.gateway.upload(file, Some(progress)).await;
        if !inner.is_epoch(epoch) {
            debug!("upload finished after being superseded; discarding result");
            return Ok(UploadOutcome::Superseded);
        }

        let accepted = match result {
            Ok(accepted) => accepted,
            Err(err) => return inner.upload_failed(err),
        };
        let Some(receipt_id) = accepted.receipt_id else {
            warn!("upload response carried no receipt id");
            inner.fail_and_reset(MISSING_ID_MESSAGE);
            inner.notifier.notify(Notification::error(MISSING_ID_MESSAGE));
            return Err(ApplicationError::infrastructure(MISSING_ID_MESSAGE));
        };

        {
            let mut state = inner.lock_state();
            state.enter_processing(receipt_id.clone())?;
            inner.publish(&state);
        }
        info!(receipt_id = %receipt_id, "upload accepted; processing");
        inner.cache.invalidate(CacheScope::Quota);
        inner.cache.invalidate(CacheScope::ReceiptList);
        inner.start_polling();
        Ok(UploadOutcome::Processing { receipt_id })
    }

    /// Starts the status poller for the receipt being processed. Returns
    /// `false` when nothing is processing or a poller already runs.
    pub fn start_polling(&self) -> bool {
        self.inner.start_polling()
    }

    /// Abandons the current upload and returns to file selection.
    pub fn cancel(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.stop_tasks();
        let mut state = self.inner.lock_state();
        *state = UploadSession::default();
        self.inner.publish(&state);
        debug!("upload cancelled");
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.stop_tasks();
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, UploadSession> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_epoch(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Callers hold the state lock so transitions are published in order.
    fn publish(&self, session: &UploadSession) {
        let previous = self.snapshots.borrow().stage;
        self.snapshots.send_replace(session.clone());
        if previous != session.stage {
            // No receivers is fine.
            let _ = self.stages.send(session.stage);
        }
    }

    fn stop_tasks(&self) {
        for slot in [&self.poller, &self.pending_navigation] {
            if let Some(handle) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                handle.abort();
            }
        }
    }

    async fn ensure_quota(&self) -> ApplicationResult<()> {
        match self.gateway.quota_status().await {
            Ok(quota) if quota.quota_exceeded => {
                let message = quota.exceeded_message();
                warn!(used = ?quota.current_month_uploads, limit = ?quota.monthly_limit, "upload quota exhausted");
                self.notifier
                    .notify(Notification::error(message.clone()).lasting(LONG_TOAST));
                Err(ApplicationError::validation(message))
            }
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(error = %err, "quota check failed; uploading anyway");
                Ok(())
            }
        }
    }

    /// Abandons whatever the previous upload left running and returns the
    /// epoch of the new one.
    fn supersede(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.stop_tasks();
        let mut state = self.lock_state();
        if state.stage != UploadStage::Select {
            state.reset();
            self.publish(&state);
        }
        epoch
    }

    fn begin_upload(&self) {
        let mut state = self.lock_state();
        state.begin_upload();
        self.publish(&state);
    }

    fn record_upload_progress(&self, epoch: u64, percent: u8) {
        if !self.is_epoch(epoch) {
            return;
        }
        let mut state = self.lock_state();
        if state.stage == UploadStage::Uploading && state.upload_progress != percent.min(100) {
            state.set_upload_progress(percent);
            self.publish(&state);
        }
    }

    fn fail_and_reset(&self, message: &str) {
        let mut state = self.lock_state();
        state.fail(message);
        self.publish(&state);
        state.reset();
        self.publish(&state);
    }

    fn upload_failed(&self, err: ApplicationError) -> ApplicationResult<UploadOutcome> {
        if let Some(api) = err.as_api().filter(|api| api.has_code(DUPLICATE_RECEIPT)) {
            let existing_receipt_id = api.context_str("existing_receipt_id");
            let message = api.message.clone().unwrap_or_else(|| DUPLICATE_MESSAGE.to_owned());
            info!(existing = ?existing_receipt_id, "duplicate receipt");
            let mut state = self.lock_state();
            state.reset();
            self.publish(&state);
            return Ok(UploadOutcome::Duplicate {
                existing_receipt_id,
                message,
            });
        }

        let message = match err.as_api() {
            Some(api) => api.message.clone().unwrap_or_else(|| UPLOAD_FAILED_MESSAGE.to_owned()),
            None => UPLOAD_FAILED_MESSAGE.to_owned(),
        };
        warn!(error = %err, "upload failed");
        self.fail_and_reset(&message);
        if !err.was_notified() {
            self.notifier.notify(Notification::error(message));
        }
        Err(err)
    }

    fn start_polling(self: &Arc<Self>) -> bool {
        let mut slot = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let receipt_id = {
            let state = self.lock_state();
            match (&state.receipt_id, state.is_polling()) {
                (Some(id), true) => id.clone(),
                _ => return false,
            }
        };
        let epoch = self.epoch.load(Ordering::SeqCst);
        let weak = Arc::downgrade(self);
        let period = self.config.interval;
        debug!(receipt_id = %receipt_id, interval_ms = period.as_millis(), "polling started");
        *slot = Some(tokio::spawn(poll_loop(weak, epoch, receipt_id, period)));
        true
    }

    /// True while `receipt_id` is still the receipt being processed.
    fn is_current(&self, epoch: u64, state: &UploadSession, receipt_id: &str) -> bool {
        self.is_epoch(epoch) && state.is_polling() && state.receipt_id.as_deref() == Some(receipt_id)
    }

    async fn check_status(self: &Arc<Self>, epoch: u64, receipt_id: &str) -> Tick {
        let attempt = {
            let mut state = self.lock_state();
            if !self.is_current(epoch, &state, receipt_id) {
                return Tick::Stop;
            }
            let attempt = state.record_poll_attempt();
            self.publish(&state);
            attempt
        };
        let exhausted = attempt >= self.config.max_attempts;
        let result = self.gateway.upload_status(receipt_id).await;

        let mut state = self.lock_state();
        if !self.is_current(epoch, &state, receipt_id) {
            return Tick::Stop;
        }
        match result {
            Ok(status) => {
                state.record_processing(status.progress(), status.current_stage.clone());
                self.publish(&state);
                if status.is_complete() {
                    // Stage was checked above.
                    let _ = state.complete();
                    self.publish(&state);
                    drop(state);
                    self.on_complete(epoch, receipt_id);
                    return Tick::Stop;
                }
                if status.status().is_failed() {
                    let message = status
                        .error_message
                        .clone()
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| FAILED_MESSAGE.to_owned());
                    warn!(receipt_id = %receipt_id, attempt, "receipt processing failed");
                    state.fail(message.clone());
                    self.publish(&state);
                    state.reset();
                    self.publish(&state);
                    drop(state);
                    self.notifier
                        .notify(Notification::error(message).lasting(LONG_TOAST));
                    return Tick::Stop;
                }
                debug!(receipt_id = %receipt_id, attempt, status = %status.status(), "still processing");
                if exhausted {
                    warn!(receipt_id = %receipt_id, attempt, "polling budget exhausted");
                    state.reset();
                    self.publish(&state);
                    drop(state);
                    self.notifier
                        .notify(Notification::warning(SLOW_MESSAGE).lasting(LONGER_TOAST));
                    self.navigator.navigate(Route::Receipts);
                    return Tick::Stop;
                }
                Tick::Continue
            }
            Err(err) if exhausted => {
                warn!(receipt_id = %receipt_id, attempt, error = %err, "status unavailable; giving up");
                state.reset();
                self.publish(&state);
                drop(state);
                self.notifier.notify(Notification::error(STATUS_UNAVAILABLE_MESSAGE));
                self.navigator.navigate(Route::Receipts);
                Tick::Stop
            }
            Err(err) => {
                warn!(receipt_id = %receipt_id, attempt, error = %err, "status check failed; retrying");
                Tick::Continue
            }
        }
    }

    fn on_complete(self: &Arc<Self>, epoch: u64, receipt_id: &str) {
        info!(receipt_id = %receipt_id, "receipt processed");
        self.notifier.notify(Notification::success(SUCCESS_MESSAGE));
        self.cache.invalidate(CacheScope::Quota);
        self.cache.invalidate(CacheScope::ReceiptList);

        let weak: Weak<Self> = Arc::downgrade(self);
        let receipt_id = receipt_id.to_owned();
        let delay = self.config.review_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            if !inner.is_epoch(epoch) {
                return;
            }
            inner.navigator.navigate(Route::ReceiptReview(receipt_id));
            let mut state = inner.lock_state();
            state.reset();
            inner.publish(&state);
        });
        if let Some(previous) = self
            .pending_navigation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
    }
}

async fn poll_loop(inner: Weak<Inner>, epoch: u64, receipt_id: String, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // A slow check pushes the next one back instead of bunching ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else { break };
        if inner.check_status(epoch, &receipt_id).await == Tick::Stop {
            break;
        }
    }
    debug!(receipt_id = %receipt_id, "polling stopped");
}
