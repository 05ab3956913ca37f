// src/application/services/mod.rs
pub mod auth;
pub mod receipts;

use std::{sync::Arc, time::Duration};

use crate::{
    application::{
        ApplicationResult,
        credentials::CredentialStore,
        pipeline::{ApiClient, PipelineConfig, ResponseInterceptor},
        ports::{
            CacheInvalidatorPort, ClockPort, DurableStorePort, HttpTransportPort,
            KeyValueStorePort, NavigatorPort, NotifierPort, ReceiptGatewayPort,
        },
        session::SessionStore,
        sync::{Subscription, TabSyncBus, bus::DEFAULT_CLEAR_DELAY, load_or_create_tab_id},
        upload::{PollingConfig, UploadController},
    },
    domain::upload::UploadLimits,
};

pub use auth::{AuthService, LoginResult};
pub use receipts::ReceiptService;

/// Adapters the client core runs on.
pub struct ClientDependencies {
    pub transport: Arc<HttpTransportPort>,
    /// Per-tab storage: access token, cached profile, tab id.
    pub short_lived: Arc<KeyValueStorePort>,
    /// Storage shared by every tab: refresh token and the sync slot.
    pub durable: Arc<DurableStorePort>,
    pub notifier: Arc<NotifierPort>,
    pub navigator: Arc<NavigatorPort>,
    pub clock: Arc<ClockPort>,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub pipeline: PipelineConfig,
    pub polling: PollingConfig,
    pub limits: UploadLimits,
    pub sync_clear_delay: Duration,
    pub quota_ttl: Duration,
    pub list_ttl: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            polling: PollingConfig::default(),
            limits: UploadLimits::default(),
            sync_clear_delay: DEFAULT_CLEAR_DELAY,
            quota_ttl: Duration::from_secs(60),
            list_ttl: Duration::from_secs(60),
        }
    }
}

/// One tab's worth of client state, wired together.
pub struct ClientServices {
    pub session: Arc<SessionStore>,
    pub sync: Arc<TabSyncBus>,
    pub client: Arc<ApiClient>,
    pub auth: Arc<AuthService>,
    pub receipts: Arc<ReceiptService>,
    notifier: Arc<NotifierPort>,
    navigator: Arc<NavigatorPort>,
    settings: ClientSettings,
    subscriptions: Vec<Subscription>,
}

impl ClientServices {
    /// Builds the services and starts listening to other tabs. Must be called
    /// inside a tokio runtime.
    pub fn new(deps: ClientDependencies, settings: ClientSettings) -> ApplicationResult<Self> {
        let tab_id = load_or_create_tab_id(deps.short_lived.as_ref())?;
        let sync = Arc::new(
            TabSyncBus::new(tab_id, Arc::clone(&deps.durable), Arc::clone(&deps.clock))
                .with_clear_delay(settings.sync_clear_delay),
        );
        sync.start()?;

        let credentials = Arc::new(CredentialStore::new(
            Arc::clone(&deps.short_lived),
            Arc::clone(&deps.durable),
        ));
        let session = Arc::new(SessionStore::new(credentials, Arc::clone(&sync)));
        let subscriptions = session.attach();

        let inbound = ResponseInterceptor::new(
            settings.pipeline.clone(),
            Arc::clone(&session),
            Arc::clone(&deps.notifier),
            Arc::clone(&deps.navigator),
            Arc::clone(&deps.clock),
        );
        let client = Arc::new(ApiClient::new(
            Arc::clone(&deps.transport),
            Arc::clone(&session),
            inbound,
            Arc::clone(&deps.clock),
        ));

        let auth = Arc::new(AuthService::new(Arc::clone(&client), Arc::clone(&session)));
        let receipts = Arc::new(ReceiptService::new(
            Arc::clone(&client),
            Arc::clone(&deps.clock),
            settings.quota_ttl,
            settings.list_ttl,
        ));

        Ok(Self {
            session,
            sync,
            client,
            auth,
            receipts,
            notifier: deps.notifier,
            navigator: deps.navigator,
            settings,
            subscriptions,
        })
    }

    /// A fresh upload flow. Each screen that uploads owns its own controller.
    pub fn upload_controller(&self) -> UploadController {
        let gateway: Arc<ReceiptGatewayPort> = Arc::clone(&self.receipts) as _;
        let cache: Arc<CacheInvalidatorPort> = Arc::clone(&self.receipts) as _;
        UploadController::new(
            gateway,
            cache,
            Arc::clone(&self.notifier),
            Arc::clone(&self.navigator),
            self.settings.polling.clone(),
            self.settings.limits.clone(),
        )
    }

    /// Detaches from other tabs. The persisted session is left alone.
    pub fn shutdown(mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.sync.stop();
    }
}
