use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use beacon_core::config::OutcomesConfig;
use beacon_core::ids::{AppId, NotificationId};
use beacon_core::outcomes::OutcomeReport;
use beacon_core::platform::PlatformProbe;
use beacon_core::session::Session;
use beacon_core::transport::OutcomeTransport;
use beacon_store::notifications::NotificationRepo;
use beacon_store::outcomes::OutcomeLedger;
use beacon_store::Database;

use crate::error::EngineError;
use crate::gate::InitGate;
use crate::tracker::SessionTracker;

/// What a `report_outcome` call amounted to. Only `Sent` reached the
/// network; it carries the report that did.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportDisposition {
    Sent(OutcomeReport),
    DuplicateSuppressed,
    NotSubscribed,
    NoQualifyingCategory,
    MissingOutcomeId,
}

/// How an outcome was pinned to notification activity.
enum Attribution {
    Direct(NotificationId),
    Indirect(Vec<NotificationId>),
    Unattributed,
}

impl Attribution {
    fn notification_ids(&self) -> &[NotificationId] {
        match self {
            Self::Direct(id) => std::slice::from_ref(id),
            Self::Indirect(ids) => ids,
            Self::Unattributed => &[],
        }
    }

    fn direct_flag(&self) -> Option<bool> {
        match self {
            Self::Direct(_) => Some(true),
            Self::Indirect(_) => Some(false),
            Self::Unattributed => None,
        }
    }
}

/// Classifies reported outcomes and enforces per-session, evidence-sensitive
/// deduplication before handing finished reports to the transport.
pub struct OutcomeAttributionEngine {
    gate: Arc<InitGate>,
    tracker: Arc<SessionTracker>,
    notifications: NotificationRepo,
    ledger: OutcomeLedger,
    platform: Arc<dyn PlatformProbe>,
    transport: Arc<dyn OutcomeTransport>,
    config: OutcomesConfig,
    app_id: AppId,
}

impl OutcomeAttributionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        gate: Arc<InitGate>,
        tracker: Arc<SessionTracker>,
        platform: Arc<dyn PlatformProbe>,
        transport: Arc<dyn OutcomeTransport>,
        config: OutcomesConfig,
        app_id: AppId,
    ) -> Self {
        Self {
            gate,
            tracker,
            notifications: NotificationRepo::new(db.clone()),
            ledger: OutcomeLedger::new(db),
            platform,
            transport,
            config,
            app_id,
        }
    }

    /// Report an outcome by name.
    ///
    /// Suspends until initialization completes, classifies the outcome
    /// (direct > indirect > unattributed), suppresses repeats whose evidence
    /// set is unchanged, and awaits the transport so callers observe
    /// terminal failure. A transport failure leaves the ledger entry in
    /// place: one attempt per evidence set, never more.
    #[instrument(skip(self, weight))]
    pub async fn report_outcome(
        &self,
        outcome_id: &str,
        weight: Option<f64>,
    ) -> Result<ReportDisposition, EngineError> {
        if outcome_id.trim().is_empty() {
            error!("outcome name is empty, nothing to report");
            return Ok(ReportDisposition::MissingOutcomeId);
        }

        self.gate.wait().await;

        if !self.platform.subscription_state().is_subscribed() {
            debug!(outcome_id, "not subscribed to push, outcome dropped");
            return Ok(ReportDisposition::NotSubscribed);
        }

        let session = self.tracker.ensure_session()?;

        let Some(attribution) = self.classify(&session)? else {
            debug!(outcome_id, "no enabled outcome category applies");
            return Ok(ReportDisposition::NoQualifyingCategory);
        };

        let evidence = attribution.notification_ids();
        if let Some(prior) = self.ledger.attempted_evidence(&session.id, outcome_id)? {
            if same_evidence(&prior, evidence) {
                warn!(
                    outcome_id,
                    session_id = %session.id,
                    "outcome already reported this session with identical evidence, suppressed"
                );
                return Ok(ReportDisposition::DuplicateSuppressed);
            }
        }

        let report = OutcomeReport {
            app_id: self.app_id.clone(),
            id: outcome_id.to_string(),
            device_type: self.platform.device_type(),
            notification_ids: evidence.to_vec(),
            direct: attribution.direct_flag(),
            weight: weight.filter(|w| *w != 0.0),
        };

        // Recorded before the send: a failed attempt still consumes the
        // evidence set.
        self.ledger.record_attempt(&session.id, outcome_id, evidence)?;
        self.transport.send_outcome(&report).await?;

        info!(
            outcome_id,
            session_id = %session.id,
            direct = ?report.direct,
            notifications = report.notification_ids.len(),
            "outcome reported"
        );
        Ok(ReportDisposition::Sent(report))
    }

    /// First match wins: a click inside the session beats recent receipts,
    /// which beat reporting with no evidence at all.
    fn classify(&self, session: &Session) -> Result<Option<Attribution>, EngineError> {
        if self.config.direct.enabled {
            if let Some(click) = self.notifications.latest_click_since(session.started_at)? {
                return Ok(Some(Attribution::Direct(click.notification_id)));
            }
        }

        if self.config.indirect.enabled {
            let received = self.notifications.received_within(
                self.config.indirect.lookback_window(),
                self.config.indirect.max_notifications,
            )?;
            if !received.is_empty() {
                return Ok(Some(Attribution::Indirect(
                    received.into_iter().map(|e| e.notification_id).collect(),
                )));
            }
        }

        if self.config.unattributed.enabled {
            return Ok(Some(Attribution::Unattributed));
        }

        Ok(None)
    }
}

/// Order-independent comparison; the ledger stores its side sorted.
fn same_evidence(prior: &[NotificationId], current: &[NotificationId]) -> bool {
    if prior.len() != current.len() {
        return false;
    }
    let mut current: Vec<&str> = current.iter().map(|id| id.as_str()).collect();
    current.sort_unstable();
    prior
        .iter()
        .map(|id| id.as_str())
        .eq(current.into_iter())
}
