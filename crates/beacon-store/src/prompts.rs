use chrono::Utc;
use tracing::instrument;

use beacon_core::config::PromptKind;
use beacon_core::ids::SessionId;

use crate::database::Database;
use crate::error::StoreError;

/// Durable exactly-once latch for prompt displays, one row per
/// (session, prompt kind).
pub struct PromptLedger {
    db: Database,
}

impl PromptLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn has_fired(&self, session_id: &SessionId, kind: PromptKind) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM prompt_fires WHERE session_id = ?1 AND prompt_kind = ?2",
                rusqlite::params![session_id.as_str(), kind.to_string()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Take the latch. Returns true only for the call that inserted the row;
    /// every later call for the same (session, kind) returns false.
    #[instrument(skip(self), fields(session_id = %session_id, kind = %kind))]
    pub fn mark_fired(&self, session_id: &SessionId, kind: PromptKind) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO prompt_fires (session_id, prompt_kind, fired_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![session_id.as_str(), kind.to_string(), now],
            )?;
            Ok(inserted > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionRepo;

    fn setup() -> (PromptLedger, SessionId) {
        let db = Database::in_memory().unwrap();
        let session = SessionRepo::new(db.clone()).create().unwrap();
        (PromptLedger::new(db), session.id)
    }

    #[test]
    fn latch_taken_once() {
        let (ledger, session) = setup();
        assert!(!ledger.has_fired(&session, PromptKind::Slidedown).unwrap());
        assert!(ledger.mark_fired(&session, PromptKind::Slidedown).unwrap());
        assert!(!ledger.mark_fired(&session, PromptKind::Slidedown).unwrap());
        assert!(ledger.has_fired(&session, PromptKind::Slidedown).unwrap());
    }

    #[test]
    fn kinds_latch_independently() {
        let (ledger, session) = setup();
        assert!(ledger.mark_fired(&session, PromptKind::Slidedown).unwrap());
        assert!(!ledger.has_fired(&session, PromptKind::Native).unwrap());
        assert!(ledger.mark_fired(&session, PromptKind::Native).unwrap());
    }

    #[test]
    fn sessions_latch_independently() {
        let db = Database::in_memory().unwrap();
        let repo = SessionRepo::new(db.clone());
        let first = repo.create().unwrap();
        let second = repo.create().unwrap();
        let ledger = PromptLedger::new(db);

        assert!(ledger.mark_fired(&first.id, PromptKind::Slidedown).unwrap());
        assert!(!ledger.has_fired(&second.id, PromptKind::Slidedown).unwrap());
        assert!(ledger.mark_fired(&second.id, PromptKind::Slidedown).unwrap());
    }
}
