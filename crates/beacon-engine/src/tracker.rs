use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument};

use beacon_core::config::SessionConfig;
use beacon_core::session::{Session, SessionStatus};
use beacon_store::sessions::SessionRepo;
use beacon_store::Database;

use crate::error::EngineError;

/// Result of driving the tracker with a page-lifecycle event.
#[derive(Clone, Debug)]
pub struct PageView {
    pub session: Session,
    pub started_new_session: bool,
}

/// Maintains the live session and its persisted page-view counter.
///
/// Expiry is judged on page lifecycle events only: a session idle longer
/// than the configured threshold is replaced, which also gives the dedup and
/// prompt ledgers (keyed by session id) a clean scope.
pub struct SessionTracker {
    sessions: SessionRepo,
    inactivity_timeout: Duration,
}

impl SessionTracker {
    pub fn new(db: Database, config: &SessionConfig) -> Self {
        Self {
            sessions: SessionRepo::new(db),
            inactivity_timeout: config.inactivity_timeout(),
        }
    }

    /// Handle a load/navigation/refresh. Counts the view, replacing the
    /// session first when the previous one sat idle too long. State is
    /// persisted before this returns.
    #[instrument(skip(self))]
    pub fn on_page_view(&self) -> Result<PageView, EngineError> {
        match self.sessions.current()? {
            Some(session) if self.is_expired(&session) => {
                self.sessions.update_status(&session.id, SessionStatus::Expired)?;
                let fresh = self.sessions.create()?;
                info!(
                    old_session_id = %session.id,
                    session_id = %fresh.id,
                    "session expired after inactivity, started a new one"
                );
                Ok(PageView {
                    session: fresh,
                    started_new_session: true,
                })
            }
            Some(session) => {
                self.sessions.record_page_view(&session.id)?;
                Ok(PageView {
                    session: self.sessions.get(&session.id)?,
                    started_new_session: false,
                })
            }
            None => {
                let fresh = self.sessions.create()?;
                info!(session_id = %fresh.id, "first page activity, session started");
                Ok(PageView {
                    session: fresh,
                    started_new_session: true,
                })
            }
        }
    }

    /// The live session, creating one if no page activity happened yet.
    /// Does not count a page view and does not judge expiry (that happens
    /// on page lifecycle events).
    pub fn ensure_session(&self) -> Result<Session, EngineError> {
        match self.sessions.current()? {
            Some(session) => Ok(session),
            None => Ok(self.sessions.create()?),
        }
    }

    pub fn current_session(&self) -> Result<Option<Session>, EngineError> {
        Ok(self.sessions.current()?)
    }

    /// Page-view count of the live session, re-read from durable state.
    pub fn page_view_count(&self) -> Result<u64, EngineError> {
        match self.sessions.current()? {
            Some(session) => Ok(self.sessions.page_views(&session.id)?),
            None => Ok(0),
        }
    }

    /// Visibility change: Active when focused, Unfocused otherwise. Also
    /// refreshes the activity timestamp so focus flaps do not expire the
    /// session.
    pub fn set_focus(&self, focused: bool) -> Result<(), EngineError> {
        if let Some(session) = self.sessions.current()? {
            let status = if focused {
                SessionStatus::Active
            } else {
                SessionStatus::Unfocused
            };
            self.sessions.update_status(&session.id, status)?;
        }
        Ok(())
    }

    fn is_expired(&self, session: &Session) -> bool {
        let idle = Utc::now().signed_duration_since(session.last_active_at);
        match chrono::Duration::from_std(self.inactivity_timeout) {
            Ok(timeout) => idle > timeout,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::ids::SessionId;

    fn setup(timeout_secs: u64) -> (Database, SessionTracker) {
        let db = Database::in_memory().unwrap();
        let tracker = SessionTracker::new(
            db.clone(),
            &SessionConfig {
                inactivity_timeout_secs: timeout_secs,
            },
        );
        (db, tracker)
    }

    fn backdate_activity(db: &Database, id: &SessionId, seconds: i64) {
        let stale = (Utc::now() - chrono::Duration::seconds(seconds)).to_rfc3339();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET last_active_at = ?1 WHERE id = ?2",
                rusqlite::params![stale, id.as_str()],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn first_page_view_starts_session_at_one() {
        let (_db, tracker) = setup(1800);
        let view = tracker.on_page_view().unwrap();
        assert!(view.started_new_session);
        assert_eq!(view.session.page_views, 1);
        assert_eq!(tracker.page_view_count().unwrap(), 1);
    }

    #[test]
    fn navigations_increment_persisted_count() {
        let (_db, tracker) = setup(1800);
        tracker.on_page_view().unwrap();
        tracker.on_page_view().unwrap();
        let view = tracker.on_page_view().unwrap();
        assert!(!view.started_new_session);
        assert_eq!(view.session.page_views, 3);
        assert_eq!(tracker.page_view_count().unwrap(), 3);
    }

    #[test]
    fn idle_session_is_replaced_with_fresh_counter() {
        let (db, tracker) = setup(60);
        let first = tracker.on_page_view().unwrap().session;
        tracker.on_page_view().unwrap();
        backdate_activity(&db, &first.id, 120);

        let view = tracker.on_page_view().unwrap();
        assert!(view.started_new_session);
        assert_ne!(view.session.id, first.id);
        assert_eq!(view.session.page_views, 1);

        let repo = SessionRepo::new(db);
        assert_eq!(repo.get(&first.id).unwrap().status, SessionStatus::Expired);
    }

    #[test]
    fn recent_activity_keeps_session() {
        let (db, tracker) = setup(60);
        let first = tracker.on_page_view().unwrap().session;
        backdate_activity(&db, &first.id, 30);

        let view = tracker.on_page_view().unwrap();
        assert!(!view.started_new_session);
        assert_eq!(view.session.id, first.id);
    }

    #[test]
    fn ensure_session_creates_without_counting() {
        let (_db, tracker) = setup(1800);
        let session = tracker.ensure_session().unwrap();
        assert_eq!(session.page_views, 1);
        // a second call reuses the same session
        assert_eq!(tracker.ensure_session().unwrap().id, session.id);
    }

    #[test]
    fn focus_changes_flip_status() {
        let (_db, tracker) = setup(1800);
        let session = tracker.on_page_view().unwrap().session;

        tracker.set_focus(false).unwrap();
        assert_eq!(
            tracker.current_session().unwrap().unwrap().status,
            SessionStatus::Unfocused
        );
        assert_eq!(
            tracker.current_session().unwrap().unwrap().id,
            session.id
        );

        tracker.set_focus(true).unwrap();
        assert_eq!(
            tracker.current_session().unwrap().unwrap().status,
            SessionStatus::Active
        );
    }

    #[test]
    fn no_session_means_zero_page_views() {
        let (_db, tracker) = setup(1800);
        assert_eq!(tracker.page_view_count().unwrap(), 0);
        assert!(tracker.current_session().unwrap().is_none());
    }
}
