use chrono::Utc;
use tracing::instrument;

use beacon_core::ids::{NotificationId, SessionId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Per-session record of outcome attempts and the notification-id evidence
/// each attempt carried. Keyed by session, so a replacement session starts
/// with a clean slate while rows survive page reloads.
pub struct OutcomeLedger {
    db: Database,
}

impl OutcomeLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The evidence set recorded for a prior attempt of this outcome in this
    /// session, sorted. `None` if the outcome has not been attempted.
    pub fn attempted_evidence(
        &self,
        session_id: &SessionId,
        outcome_id: &str,
    ) -> Result<Option<Vec<NotificationId>>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT notification_ids FROM outcome_attempts
                 WHERE session_id = ?1 AND outcome_id = ?2",
            )?;
            let mut rows = stmt.query(rusqlite::params![session_id.as_str(), outcome_id])?;
            match rows.next()? {
                Some(row) => {
                    let raw: String =
                        row_helpers::get(row, 0, "outcome_attempts", "notification_ids")?;
                    let ids: Vec<String> =
                        row_helpers::parse_json(&raw, "outcome_attempts", "notification_ids")?;
                    Ok(Some(ids.into_iter().map(NotificationId::from_raw).collect()))
                }
                None => Ok(None),
            }
        })
    }

    /// Record (or replace) the attempt for this outcome with the given
    /// evidence set. Stored sorted so comparisons are order-independent.
    #[instrument(skip(self, notification_ids), fields(session_id = %session_id, outcome_id))]
    pub fn record_attempt(
        &self,
        session_id: &SessionId,
        outcome_id: &str,
        notification_ids: &[NotificationId],
    ) -> Result<(), StoreError> {
        let mut sorted: Vec<&str> = notification_ids.iter().map(|id| id.as_str()).collect();
        sorted.sort_unstable();
        let json = serde_json::to_string(&sorted)?;
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO outcome_attempts (session_id, outcome_id, notification_ids, reported_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (session_id, outcome_id)
                 DO UPDATE SET notification_ids = ?3, reported_at = ?4",
                rusqlite::params![session_id.as_str(), outcome_id, json, now],
            )?;
            Ok(())
        })
    }
}
