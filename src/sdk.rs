use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use beacon_api::ApiClient;
use beacon_core::config::{PromptKind, SdkConfig};
use beacon_core::errors::TransportError;
use beacon_core::events::SdkEvent;
use beacon_core::ids::NotificationId;
use beacon_core::notifications::NotificationEvent;
use beacon_core::platform::PlatformProbe;
use beacon_core::session::Session;
use beacon_core::transport::{OutcomeTransport, PlayerUpsert, PromptPresenter};
use beacon_engine::{
    EngineError, InitGate, OutcomeAttributionEngine, PromptScheduler, PromptTrigger,
    ReportDisposition, SessionTracker,
};
use beacon_store::notifications::NotificationRepo;
use beacon_store::{Database, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("sdk is not fully configured: {0}")]
    Builder(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Wires the engines together from a configuration plus collaborators.
/// The platform probe is required; everything else has a default (in-memory
/// store, REST transport from the api config, no-op presenter).
pub struct SdkBuilder {
    config: SdkConfig,
    db: Option<Database>,
    transport: Option<Arc<dyn OutcomeTransport>>,
    platform: Option<Arc<dyn PlatformProbe>>,
    presenter: Option<Arc<dyn PromptPresenter>>,
}

impl SdkBuilder {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            db: None,
            transport: None,
            platform: None,
            presenter: None,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn OutcomeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_platform(mut self, platform: Arc<dyn PlatformProbe>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn PromptPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn build(self) -> Result<Sdk, SdkError> {
        let config = Arc::new(self.config);
        let platform = self
            .platform
            .ok_or_else(|| SdkError::Builder("a platform probe is required".into()))?;
        let db = match self.db {
            Some(db) => db,
            None => Database::in_memory()?,
        };
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ApiClient::new(&config.api)));

        let (event_tx, _) = broadcast::channel(256);
        let gate = Arc::new(InitGate::new());
        let tracker = Arc::new(SessionTracker::new(db.clone(), &config.session));

        let presenter: Arc<dyn PromptPresenter> = Arc::new(EmittingPresenter {
            inner: self.presenter.unwrap_or_else(|| Arc::new(NoopPresenter)),
            event_tx: event_tx.clone(),
        });

        let schedulers = DashMap::new();
        for kind in PromptKind::ALL {
            schedulers.insert(
                kind,
                Arc::new(PromptScheduler::new(
                    kind,
                    config.prompts.rule(kind).clone(),
                    db.clone(),
                    presenter.clone(),
                )),
            );
        }

        let attribution = Arc::new(OutcomeAttributionEngine::new(
            db.clone(),
            Arc::clone(&gate),
            Arc::clone(&tracker),
            Arc::clone(&platform),
            Arc::clone(&transport),
            config.outcomes.clone(),
            config.app_id.as_app_id().clone(),
        ));

        Ok(Sdk {
            notifications: NotificationRepo::new(db),
            config,
            gate,
            tracker,
            attribution,
            schedulers,
            transport,
            platform,
            event_tx,
            initialized: AtomicBool::new(false),
        })
    }
}

/// The SDK facade a host application drives: page lifecycle in, outcome
/// reports and prompt decisions out.
pub struct Sdk {
    config: Arc<SdkConfig>,
    gate: Arc<InitGate>,
    tracker: Arc<SessionTracker>,
    attribution: Arc<OutcomeAttributionEngine>,
    schedulers: DashMap<PromptKind, Arc<PromptScheduler>>,
    notifications: NotificationRepo,
    transport: Arc<dyn OutcomeTransport>,
    platform: Arc<dyn PlatformProbe>,
    event_tx: broadcast::Sender<SdkEvent>,
    initialized: AtomicBool,
}

impl Sdk {
    pub fn builder(config: SdkConfig) -> SdkBuilder {
        SdkBuilder::new(config)
    }

    /// Subscribe to SDK lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<SdkEvent> {
        self.event_tx.subscribe()
    }

    /// Complete bootstrap: register the player, release every caller parked
    /// on the init gate, and arm the auto-prompt schedulers. Later calls are
    /// no-ops; a failed registration leaves the SDK uninitialized so the
    /// host can retry.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<(), SdkError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("already initialized");
            return Ok(());
        }

        let player = PlayerUpsert {
            app_id: self.config.app_id.as_app_id().clone(),
            device_type: self.platform.device_type(),
            external_user_id: None,
        };
        if let Err(e) = self.transport.upsert_player(&player).await {
            self.initialized.store(false, Ordering::SeqCst);
            return Err(SdkError::Transport(e));
        }

        self.gate.open();
        self.arm_auto_prompts();
        self.emit(SdkEvent::Initialized);
        info!("sdk initialized");
        Ok(())
    }

    /// Page load/navigation/refresh. Counts the view, replaces an expired
    /// session, and re-evaluates the prompt schedulers.
    pub async fn page_view(&self) -> Result<Session, SdkError> {
        let view = self.tracker.on_page_view()?;
        if view.started_new_session {
            self.emit(SdkEvent::SessionStarted {
                session_id: view.session.id.clone(),
            });
        }
        self.emit(SdkEvent::PageView {
            session_id: view.session.id.clone(),
            page_views: view.session.page_views,
        });

        if self.gate.is_open() {
            if view.started_new_session {
                // fresh session, fresh prompt scope
                self.arm_auto_prompts();
            }
            self.evaluate_prompts(PromptTrigger::PageViewChanged).await;
        }

        Ok(view.session)
    }

    /// Record a push delivery into the notification event log.
    pub fn notification_received(&self, id: NotificationId) -> Result<(), SdkError> {
        self.notifications.record(&NotificationEvent::received(
            id.clone(),
            self.config.app_id.as_app_id().clone(),
            Utc::now(),
        ))?;
        self.emit(SdkEvent::NotificationReceived {
            notification_id: id,
        });
        Ok(())
    }

    /// Record a notification click into the notification event log.
    pub fn notification_clicked(&self, id: NotificationId) -> Result<(), SdkError> {
        self.notifications.record(&NotificationEvent::clicked(
            id.clone(),
            self.config.app_id.as_app_id().clone(),
            Utc::now(),
        ))?;
        self.emit(SdkEvent::NotificationClicked {
            notification_id: id,
        });
        Ok(())
    }

    /// Report an outcome by name.
    pub async fn send_outcome(&self, outcome_id: &str) -> Result<ReportDisposition, SdkError> {
        self.report(outcome_id, None).await
    }

    /// Report an outcome carrying a value (a zero weight is dropped).
    pub async fn send_outcome_weighted(
        &self,
        outcome_id: &str,
        weight: f64,
    ) -> Result<ReportDisposition, SdkError> {
        self.report(outcome_id, Some(weight)).await
    }

    async fn report(
        &self,
        outcome_id: &str,
        weight: Option<f64>,
    ) -> Result<ReportDisposition, SdkError> {
        let disposition = self.attribution.report_outcome(outcome_id, weight).await?;
        if let ReportDisposition::Sent(report) = &disposition {
            self.emit(SdkEvent::OutcomeReported {
                outcome_id: report.id.clone(),
                direct: report.direct,
                notification_ids: report.notification_ids.clone(),
            });
        }
        Ok(disposition)
    }

    /// Visibility change from the page lifecycle.
    pub fn set_focus(&self, focused: bool) -> Result<(), SdkError> {
        Ok(self.tracker.set_focus(focused)?)
    }

    pub fn page_view_count(&self) -> Result<u64, SdkError> {
        Ok(self.tracker.page_view_count()?)
    }

    pub fn current_session(&self) -> Result<Option<Session>, SdkError> {
        Ok(self.tracker.current_session()?)
    }

    fn arm_auto_prompts(&self) {
        for entry in self.schedulers.iter() {
            let rule = self.config.prompts.rule(*entry.key());
            if rule.enabled && rule.auto_prompt {
                entry.value().arm();
            }
        }
    }

    async fn evaluate_prompts(&self, trigger: PromptTrigger) {
        // snapshot first: map guards must not be held across the awaits
        let schedulers: Vec<Arc<PromptScheduler>> = self
            .schedulers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for scheduler in schedulers {
            if let Err(e) = scheduler.evaluate(trigger).await {
                warn!(kind = %scheduler.kind(), error = %e, "prompt evaluation failed");
            }
        }
    }

    fn emit(&self, event: SdkEvent) {
        // nobody listening is fine
        let _ = self.event_tx.send(event);
    }
}

/// Forwards display decisions to the host presenter and mirrors them onto
/// the event stream.
struct EmittingPresenter {
    inner: Arc<dyn PromptPresenter>,
    event_tx: broadcast::Sender<SdkEvent>,
}

#[async_trait]
impl PromptPresenter for EmittingPresenter {
    async fn display(&self, kind: PromptKind) {
        self.inner.display(kind).await;
        let _ = self.event_tx.send(SdkEvent::PromptDisplayed { kind });
    }
}

/// Default presenter for hosts that only use outcome reporting.
struct NoopPresenter;

#[async_trait]
impl PromptPresenter for NoopPresenter {
    async fn display(&self, kind: PromptKind) {
        debug!(kind = %kind, "no presenter wired, prompt decision dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    use beacon_api::MockTransport;
    use beacon_core::platform::{DeviceType, StaticPlatform, SubscriptionState};

    struct CountingPresenter {
        displays: Mutex<Vec<PromptKind>>,
    }

    impl CountingPresenter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                displays: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.displays.lock().len()
        }
    }

    #[async_trait]
    impl PromptPresenter for CountingPresenter {
        async fn display(&self, kind: PromptKind) {
            self.displays.lock().push(kind);
        }
    }

    struct Harness {
        sdk: Arc<Sdk>,
        db: Database,
        transport: Arc<MockTransport>,
        presenter: Arc<CountingPresenter>,
    }

    fn harness(mutate: impl FnOnce(&mut SdkConfig)) -> Harness {
        let mut config = SdkConfig::default();
        config.app_id = beacon_core::config::AppIdField(beacon_core::ids::AppId::from_raw(
            "app-test",
        ));
        mutate(&mut config);

        let db = Database::in_memory().unwrap();
        let transport = Arc::new(MockTransport::new());
        let presenter = CountingPresenter::new();

        let sdk = Sdk::builder(config)
            .with_database(db.clone())
            .with_transport(transport.clone())
            .with_platform(Arc::new(StaticPlatform {
                device: DeviceType::Desktop,
                subscription: SubscriptionState::Subscribed,
            }))
            .with_presenter(presenter.clone())
            .build()
            .unwrap();

        Harness {
            sdk: Arc::new(sdk),
            db,
            transport,
            presenter,
        }
    }

    fn slidedown_auto(page_views: u64, time_delay_secs: u64) -> impl FnOnce(&mut SdkConfig) {
        move |config: &mut SdkConfig| {
            config.prompts.slidedown.enabled = true;
            config.prompts.slidedown.auto_prompt = true;
            config.prompts.slidedown.page_views = page_views;
            config.prompts.slidedown.time_delay_secs = time_delay_secs;
        }
    }

    #[tokio::test]
    async fn build_requires_platform_probe() {
        let result = Sdk::builder(SdkConfig::default()).build();
        assert!(matches!(result, Err(SdkError::Builder(_))));
    }

    #[tokio::test]
    async fn init_registers_player_exactly_once() {
        let h = harness(|_| {});
        h.sdk.init().await.unwrap();
        h.sdk.init().await.unwrap();

        let players = h.transport.upserted_players();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].app_id.as_str(), "app-test");
    }

    #[tokio::test]
    async fn failed_registration_leaves_sdk_uninitialized() {
        let h = harness(|_| {});
        h.transport
            .fail_next_player(TransportError::NetworkError("reset".into()));

        assert!(h.sdk.init().await.is_err());
        // retry succeeds and opens the gate
        h.sdk.init().await.unwrap();
        assert_eq!(h.transport.upserted_players().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn outcome_reported_before_init_stays_pending() {
        let h = harness(|_| {});
        let sdk = Arc::clone(&h.sdk);

        let pending = tokio::spawn(async move { sdk.send_outcome("purchase").await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!pending.is_finished());
        assert_eq!(h.transport.outcome_call_count(), 0);

        h.sdk.init().await.unwrap();
        let disposition = pending.await.unwrap().unwrap();
        assert!(matches!(disposition, ReportDisposition::Sent(_)));
        assert_eq!(h.transport.outcome_call_count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn page_views_drive_the_prompt_exactly_once() {
        let h = harness(slidedown_auto(2, 0));
        h.sdk.init().await.unwrap();

        h.sdk.page_view().await.unwrap();
        assert_eq!(h.presenter.count(), 0);

        h.sdk.page_view().await.unwrap();
        assert_eq!(h.presenter.count(), 1);

        h.sdk.page_view().await.unwrap();
        assert_eq!(h.presenter.count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn session_replacement_reopens_prompt_and_dedup_scope() {
        let h = harness(slidedown_auto(1, 0));
        h.sdk.init().await.unwrap();

        let first = h.sdk.page_view().await.unwrap();
        assert_eq!(h.presenter.count(), 1);

        h.sdk.notification_received(NotificationId::from_raw("n1")).unwrap();
        h.sdk.send_outcome("purchase").await.unwrap();
        assert_eq!(h.transport.outcome_call_count(), 1);

        // push the session past the inactivity threshold
        let stale = (Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
        h.db.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET last_active_at = ?1 WHERE id = ?2",
                rusqlite::params![stale, first.id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();

        let second = h.sdk.page_view().await.unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(second.page_views, 1);
        // prompt fires again for the new session
        assert_eq!(h.presenter.count(), 2);
        // and the outcome may be reported again
        let retry = h.sdk.send_outcome("purchase").await.unwrap();
        assert!(matches!(retry, ReportDisposition::Sent(_)));
        assert_eq!(h.transport.outcome_call_count(), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn event_stream_mirrors_activity() {
        let h = harness(slidedown_auto(1, 0));
        let mut events = h.sdk.events();

        h.sdk.init().await.unwrap();
        h.sdk.page_view().await.unwrap();
        h.sdk.notification_clicked(NotificationId::from_raw("n1")).unwrap();
        h.sdk.send_outcome("purchase").await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event.event_type().to_string());
        }
        assert_eq!(
            seen,
            vec![
                "initialized",
                "session_started",
                "page_view",
                "prompt_displayed",
                "notification_clicked",
                "outcome_reported",
            ]
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn prompt_with_delay_fires_from_the_timer() {
        let h = harness(slidedown_auto(1, 30));
        h.sdk.init().await.unwrap();

        h.sdk.page_view().await.unwrap();
        assert_eq!(h.presenter.count(), 0);

        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.presenter.count(), 1);
    }

    #[tokio::test]
    async fn outcome_with_click_is_direct_through_the_facade() {
        let h = harness(|_| {});
        h.sdk.init().await.unwrap();
        h.sdk.page_view().await.unwrap();
        h.sdk.notification_clicked(NotificationId::from_raw("n1")).unwrap();

        let disposition = h.sdk.send_outcome_weighted("purchase", 49.99).await.unwrap();

        let ReportDisposition::Sent(report) = disposition else {
            panic!("expected a sent report");
        };
        assert_eq!(report.direct, Some(true));
        assert_eq!(report.notification_ids[0].as_str(), "n1");
        assert_eq!(report.weight, Some(49.99));
    }
}
