use chrono::Utc;
use tracing::instrument;

use beacon_core::ids::SessionId;
use beacon_core::session::{Session, SessionStatus};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const SELECT_COLUMNS: &str = "id, status, page_views, started_at, last_active_at";

pub struct SessionRepo {
    db: Database,
}

impl SessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new session. The page view that creates a session counts,
    /// so the counter starts at 1.
    #[instrument(skip(self))]
    pub fn create(&self) -> Result<Session, StoreError> {
        let id = SessionId::new();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, status, page_views, started_at, last_active_at, created_at, updated_at)
                 VALUES (?1, 'active', 1, ?2, ?2, ?2, ?2)",
                rusqlite::params![id.as_str(), now_str],
            )?;

            Ok(Session {
                id,
                status: SessionStatus::Active,
                page_views: 1,
                started_at: now,
                last_active_at: now,
            })
        })
    }

    /// Get a session by ID.
    pub fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_session(row),
                None => Err(StoreError::NotFound(format!("session {id}"))),
            }
        })
    }

    /// The live session, if any: the newest row that has not expired.
    pub fn current(&self) -> Result<Option<Session>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sessions
                 WHERE status != 'expired'
                 ORDER BY started_at DESC, id DESC LIMIT 1"
            ))?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Increment the persisted page-view counter and refresh activity.
    /// Returns the new count.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn record_page_view(&self, id: &SessionId) -> Result<u64, StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE sessions
                 SET page_views = page_views + 1, last_active_at = ?1, status = 'active', updated_at = ?1
                 WHERE id = ?2",
                rusqlite::params![now, id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("session {id}")));
            }
            let count: i64 = conn.query_row(
                "SELECT page_views FROM sessions WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Current page-view count, re-read from durable state.
    pub fn page_views(&self, id: &SessionId) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT page_views FROM sessions WHERE id = ?1",
                    [id.as_str()],
                    |row| row.get(0),
                )
                .map_err(|_| StoreError::NotFound(format!("session {id}")))?;
            Ok(count as u64)
        })
    }

    /// Update session status (focus change, expiry).
    #[instrument(skip(self), fields(session_id = %id, status = %status))]
    pub fn update_status(&self, id: &SessionId, status: SessionStatus) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1, last_active_at = ?2, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.to_string(), now, id.as_str()],
            )?;
            Ok(())
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, StoreError> {
    let status_str: String = row_helpers::get(row, 1, "sessions", "status")?;
    let started_at: String = row_helpers::get(row, 3, "sessions", "started_at")?;
    let last_active_at: String = row_helpers::get(row, 4, "sessions", "last_active_at")?;

    Ok(Session {
        id: SessionId::from_raw(row_helpers::get::<String>(row, 0, "sessions", "id")?),
        status: row_helpers::parse_enum(&status_str, "sessions", "status")?,
        page_views: row_helpers::get::<i64>(row, 2, "sessions", "page_views")? as u64,
        started_at: row_helpers::parse_timestamp(&started_at, "sessions", "started_at")?,
        last_active_at: row_helpers::parse_timestamp(&last_active_at, "sessions", "last_active_at")?,
    })
}
