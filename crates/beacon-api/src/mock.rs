use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use beacon_core::errors::TransportError;
use beacon_core::ids::PlayerId;
use beacon_core::outcomes::OutcomeReport;
use beacon_core::transport::{OutcomeAck, OutcomeTransport, PlayerAck, PlayerUpsert};

/// Records every call and answers from a programmable script, for
/// deterministic tests without a network.
#[derive(Default)]
pub struct MockTransport {
    outcomes: Mutex<Vec<OutcomeReport>>,
    players: Mutex<Vec<PlayerUpsert>>,
    outcome_calls: AtomicUsize,
    scripted_failures: Mutex<VecDeque<TransportError>>,
    scripted_player_failures: Mutex<VecDeque<TransportError>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure; the next `send_outcome` call consumes it.
    pub fn fail_next_outcome(&self, error: TransportError) {
        self.scripted_failures.lock().push_back(error);
    }

    /// Queue a failure; the next `upsert_player` call consumes it.
    pub fn fail_next_player(&self, error: TransportError) {
        self.scripted_player_failures.lock().push_back(error);
    }

    pub fn outcome_call_count(&self) -> usize {
        self.outcome_calls.load(Ordering::Relaxed)
    }

    /// Reports that reached the transport, in call order.
    pub fn sent_outcomes(&self) -> Vec<OutcomeReport> {
        self.outcomes.lock().clone()
    }

    pub fn upserted_players(&self) -> Vec<PlayerUpsert> {
        self.players.lock().clone()
    }
}

#[async_trait]
impl OutcomeTransport for MockTransport {
    async fn send_outcome(&self, report: &OutcomeReport) -> Result<OutcomeAck, TransportError> {
        self.outcome_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.scripted_failures.lock().pop_front() {
            return Err(error);
        }
        self.outcomes.lock().push(report.clone());
        Ok(OutcomeAck {
            success: true,
            id: Some(format!("ack-{}", report.id)),
        })
    }

    async fn upsert_player(&self, player: &PlayerUpsert) -> Result<PlayerAck, TransportError> {
        if let Some(error) = self.scripted_player_failures.lock().pop_front() {
            return Err(error);
        }
        self.players.lock().push(player.clone());
        Ok(PlayerAck {
            success: true,
            player_id: PlayerId::new(),
        })
    }
}
