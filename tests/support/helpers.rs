// tests/support/helpers.rs
use super::mocks::{
    MutableClock, RecordingNavigator, RecordingNotifier, ScriptedGateway, ScriptedTransport,
    fixed_now,
};
use chrono::Duration as ChronoDuration;
use receipt_client_core::{
    application::{
        error::{ApiError, ErrorKind},
        ports::{
            cache::CacheInvalidator,
            http::HttpResponse,
            navigation::Navigator,
            notify::Notifier,
            receipts::ReceiptGateway,
            storage::{DurableStore, KeyValueStore},
            time::Clock,
        },
        services::{ClientDependencies, ClientServices, ClientSettings},
        upload::{PollingConfig, UploadController},
    },
    domain::{
        session::{TokenSet, UserProfile},
        upload::{UploadFile, UploadLimits},
    },
    infrastructure::storage::{MemoryStore, SharedOrigin},
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};

pub fn profile() -> UserProfile {
    let mut user = UserProfile::new("42", "ada@example.com");
    user.first_name = Some("Ada".into());
    user.last_name = Some("Lovelace".into());
    user.is_email_verified = true;
    user
}

/// Tokens whose access part expires `access_secs` after the fixed test time.
pub fn tokens(access: &str, refresh: &str, access_secs: i64) -> TokenSet {
    TokenSet::new(access, Some(refresh.to_owned())).with_expiry(
        Some(fixed_now() + ChronoDuration::seconds(access_secs)),
        Some(fixed_now() + ChronoDuration::days(7)),
    )
}

/// A success response in the `{ "data": ... }` envelope.
pub fn data(value: Value) -> HttpResponse {
    HttpResponse::json(200, &json!({ "data": value }))
}

pub fn error_response(status: u16, code: &str, message: &str) -> HttpResponse {
    HttpResponse::json(
        status,
        &json!({ "error": { "code": code, "message": message } }),
    )
}

pub fn refresh_reply(access: &str, refresh: &str) -> HttpResponse {
    data(json!({
        "tokens": {
            "access": access,
            "refresh": refresh,
            "access_expires_at": "2024-01-01T01:00:00Z",
        }
    }))
}

pub fn api_error(kind: ErrorKind, status: u16, code: &str) -> ApiError {
    let mut error = ApiError::new(kind, "/receipt/v1/receipts/upload/");
    error.status = Some(status);
    error.code = Some(code.to_owned());
    error
}

pub fn receipt_file() -> UploadFile {
    UploadFile::new("lunch.jpg", "image/jpeg", vec![0_u8; 2048])
}

/// Lets spawned listeners and timers run on the paused test clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// One browser tab: its own short-lived store and sync bus, sharing durable
/// storage with every other tab opened on the same origin.
pub struct Tab {
    pub services: ClientServices,
    pub short_lived: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Tab {
    pub fn open(origin: &SharedOrigin, transport: Arc<ScriptedTransport>, clock: Arc<MutableClock>) -> Self {
        Self::open_with(origin, transport, clock, ClientSettings::default())
    }

    pub fn open_with(
        origin: &SharedOrigin,
        transport: Arc<ScriptedTransport>,
        clock: Arc<MutableClock>,
        settings: ClientSettings,
    ) -> Self {
        let short_lived = Arc::new(MemoryStore::new());
        let durable: Arc<dyn DurableStore> = Arc::new(origin.open());
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let services = ClientServices::new(
            ClientDependencies {
                transport,
                short_lived: Arc::clone(&short_lived) as Arc<dyn KeyValueStore>,
                durable,
                notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
                navigator: Arc::clone(&navigator) as Arc<dyn Navigator>,
                clock: clock as Arc<dyn Clock>,
            },
            settings,
        )
        .expect("client services");
        Self {
            services,
            short_lived,
            notifier,
            navigator,
        }
    }
}

pub struct UploadHarness {
    pub controller: UploadController,
    pub gateway: Arc<ScriptedGateway>,
    pub cache: Arc<super::mocks::RecordingCache>,
    pub notifier: Arc<RecordingNotifier>,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn polling(max_attempts: u32) -> PollingConfig {
    PollingConfig {
        interval: Duration::from_secs(3),
        max_attempts,
        review_delay: Duration::from_millis(1500),
    }
}

pub fn upload_harness(config: PollingConfig) -> UploadHarness {
    let gateway = Arc::new(ScriptedGateway::new());
    let cache = Arc::new(super::mocks::RecordingCache::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let controller = UploadController::new(
        Arc::clone(&gateway) as Arc<dyn ReceiptGateway>,
        Arc::clone(&cache) as Arc<dyn CacheInvalidator>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&navigator) as Arc<dyn Navigator>,
        config,
        UploadLimits::default(),
    );
    UploadHarness {
        controller,
        gateway,
        cache,
        notifier,
        navigator,
    }
}
