use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::config::{PromptKind, PromptRuleConfig};
use beacon_core::transport::PromptPresenter;
use beacon_store::prompts::PromptLedger;
use beacon_store::sessions::SessionRepo;
use beacon_store::Database;

use crate::error::EngineError;

/// What prompted a re-evaluation. Both producers funnel into the same
/// idempotent check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptTrigger {
    PageViewChanged,
    Tick,
}

enum Phase {
    Unarmed,
    Armed { armed_at: Instant },
    Fired,
}

struct ScheduleState {
    phase: Phase,
    timer: Option<CancellationToken>,
}

/// Decides when one prompt surface gets its single display per session.
///
/// State machine: Unarmed → Armed (on initialization, or re-armed when the
/// session is replaced) → Fired (terminal for the session). The in-memory
/// latch is backed by a durable one per (session, kind), so a page reload
/// cannot re-show a prompt and racing producers cannot double-fire.
pub struct PromptScheduler {
    kind: PromptKind,
    rule: PromptRuleConfig,
    sessions: SessionRepo,
    ledger: PromptLedger,
    presenter: Arc<dyn PromptPresenter>,
    state: Mutex<ScheduleState>,
}

impl PromptScheduler {
    pub fn new(
        kind: PromptKind,
        rule: PromptRuleConfig,
        db: Database,
        presenter: Arc<dyn PromptPresenter>,
    ) -> Self {
        Self {
            kind,
            rule,
            sessions: SessionRepo::new(db.clone()),
            ledger: PromptLedger::new(db),
            presenter,
            state: Mutex::new(ScheduleState {
                phase: Phase::Unarmed,
                timer: None,
            }),
        }
    }

    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    /// Arm (or re-arm on session replacement): starts the delay clock and a
    /// timer that covers the page-views-already-met case. A disabled rule
    /// never arms.
    pub fn arm(self: &Arc<Self>) {
        if !self.rule.enabled {
            return;
        }

        let token = CancellationToken::new();
        {
            let mut state = self.state.lock();
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            state.phase = Phase::Armed {
                armed_at: Instant::now(),
            };
            state.timer = Some(token.clone());
        }
        debug!(kind = %self.kind, delay_secs = self.rule.time_delay_secs, "prompt armed");

        let scheduler = Arc::clone(self);
        let delay = self.rule.time_delay();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = scheduler.evaluate(PromptTrigger::Tick).await {
                        warn!(kind = %scheduler.kind, error = %e, "prompt tick evaluation failed");
                    }
                }
            }
        });
    }

    /// Re-check the fire conditions. Returns true only for the call that
    /// actually displayed the prompt.
    pub async fn evaluate(&self, trigger: PromptTrigger) -> Result<bool, EngineError> {
        if !self.rule.enabled {
            return Ok(false);
        }

        let armed_at = {
            let state = self.state.lock();
            match state.phase {
                Phase::Armed { armed_at } => armed_at,
                _ => return Ok(false),
            }
        };

        let Some(session) = self.sessions.current()? else {
            return Ok(false);
        };

        // A fire persisted by a previous page load wins over local state.
        if self.ledger.has_fired(&session.id, self.kind)? {
            self.settle();
            return Ok(false);
        }

        if self.sessions.page_views(&session.id)? < self.rule.page_views {
            return Ok(false);
        }
        if armed_at.elapsed() < self.rule.time_delay() {
            return Ok(false);
        }

        // Durable latch first: whichever producer takes the row displays.
        if !self.ledger.mark_fired(&session.id, self.kind)? {
            self.settle();
            return Ok(false);
        }
        self.settle();

        info!(kind = %self.kind, session_id = %session.id, ?trigger, "prompt display decision");
        self.presenter.display(self.kind).await;
        Ok(true)
    }

    /// Enter the terminal phase for this session and drop any pending timer.
    fn settle(&self) {
        let mut state = self.state.lock();
        state.phase = Phase::Fired;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    struct StubPresenter {
        displays: Mutex<Vec<PromptKind>>,
    }

    impl StubPresenter {
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
    impl PromptPresenter for StubPresenter {
        async fn display(&self, kind: PromptKind) {
            self.displays.lock().push(kind);
        }
    }

    fn rule(page_views: u64, time_delay_secs: u64) -> PromptRuleConfig {
        PromptRuleConfig {
            enabled: true,
            auto_prompt: true,
            time_delay_secs,
            page_views,
        }
    }

    struct Harness {
        db: Database,
        sessions: SessionRepo,
        presenter: Arc<StubPresenter>,
        scheduler: Arc<PromptScheduler>,
    }

    fn harness(rule: PromptRuleConfig) -> Harness {
        let db = Database::in_memory().unwrap();
        let presenter = StubPresenter::new();
        let scheduler = Arc::new(PromptScheduler::new(
            PromptKind::Slidedown,
            rule,
            db.clone(),
            presenter.clone(),
        ));
        Harness {
            sessions: SessionRepo::new(db.clone()),
            db,
            presenter,
            scheduler,
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn fires_once_after_first_page_view() {
        let h = harness(rule(1, 0));
        let session = h.sessions.create().unwrap();
        h.scheduler.arm();

        assert!(h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());

        // two more navigations: still exactly one display
        h.sessions.record_page_view(&session.id).unwrap();
        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        h.sessions.record_page_view(&session.id).unwrap();
        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());

        assert_eq!(h.presenter.count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn two_view_threshold_waits_for_second_view() {
        let h = harness(rule(2, 0));
        let session = h.sessions.create().unwrap();
        h.scheduler.arm();

        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 0);

        h.sessions.record_page_view(&session.id).unwrap();
        assert!(h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn three_view_threshold_reached_by_navigations() {
        let h = harness(rule(3, 0));
        let session = h.sessions.create().unwrap();
        h.scheduler.arm();

        for _ in 0..2 {
            h.sessions.record_page_view(&session.id).unwrap();
        }
        assert_eq!(h.sessions.page_views(&session.id).unwrap(), 3);

        assert!(h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn zero_threshold_zero_delay_fires_immediately() {
        let h = harness(rule(0, 0));
        h.sessions.create().unwrap();
        h.scheduler.arm();

        assert!(h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn timer_covers_threshold_met_before_delay() {
        let h = harness(rule(1, 5));
        h.sessions.create().unwrap();
        h.scheduler.arm();

        // threshold met, delay not yet elapsed
        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 0);

        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.presenter.count(), 1);
        // the tick already fired; later page views change nothing
        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn disabled_rule_never_arms_or_fires() {
        let h = harness(PromptRuleConfig {
            enabled: false,
            ..rule(0, 0)
        });
        h.sessions.create().unwrap();
        h.scheduler.arm();

        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert!(!h.scheduler.evaluate(PromptTrigger::Tick).await.unwrap());
        assert_eq!(h.presenter.count(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn unarmed_scheduler_ignores_triggers() {
        let h = harness(rule(0, 0));
        h.sessions.create().unwrap();

        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn durable_latch_blocks_refire_after_reload() {
        let h = harness(rule(1, 0));
        h.sessions.create().unwrap();
        h.scheduler.arm();
        assert!(h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());

        // a reload rebuilds the scheduler with fresh in-memory state
        let reloaded_presenter = StubPresenter::new();
        let reloaded = Arc::new(PromptScheduler::new(
            PromptKind::Slidedown,
            rule(1, 0),
            h.db.clone(),
            reloaded_presenter.clone(),
        ));
        reloaded.arm();

        assert!(!reloaded.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(reloaded_presenter.count(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn session_replacement_allows_one_more_fire() {
        let h = harness(rule(1, 0));
        let first = h.sessions.create().unwrap();
        h.scheduler.arm();
        assert!(h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());

        h.sessions
            .update_status(&first.id, beacon_core::session::SessionStatus::Expired)
            .unwrap();
        h.sessions.create().unwrap();
        h.scheduler.arm();

        assert!(h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert!(!h.scheduler.evaluate(PromptTrigger::PageViewChanged).await.unwrap());
        assert_eq!(h.presenter.count(), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn no_session_means_no_fire() {
        let h = harness(rule(0, 0));
        h.scheduler.arm();
        assert!(!h.scheduler.evaluate(PromptTrigger::Tick).await.unwrap());
        assert_eq!(h.presenter.count(), 0);
    }
}
