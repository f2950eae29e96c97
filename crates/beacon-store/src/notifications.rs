use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::instrument;

use beacon_core::ids::{AppId, NotificationEventId, NotificationId};
use beacon_core::notifications::{NotificationEvent, NotificationKind};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const SELECT_COLUMNS: &str = "id, notification_id, app_id, kind, occurred_at";

/// Append-only log of push deliveries and clicks.
pub struct NotificationRepo {
    db: Database,
}

impl NotificationRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self, event), fields(notification_id = %event.notification_id, kind = %event.kind))]
    pub fn record(&self, event: &NotificationEvent) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_events (id, notification_id, app_id, kind, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    event.id.as_str(),
                    event.notification_id.as_str(),
                    event.app_id.as_str(),
                    event.kind.to_string(),
                    event.occurred_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Receipts within the lookback window, most recent first, capped.
    pub fn received_within(
        &self,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<NotificationEvent>, StoreError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window)
                .map_err(|e| StoreError::Database(format!("window out of range: {e}")))?;

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM notification_events
                 WHERE kind = 'received' AND occurred_at >= ?1
                 ORDER BY occurred_at DESC LIMIT ?2"
            ))?;
            let mut rows =
                stmt.query(rusqlite::params![cutoff.to_rfc3339(), limit as i64])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_event(row)?);
            }
            Ok(results)
        })
    }

    /// The most recent click at or after the given instant. Older clicks are
    /// kept for audit but never consulted again.
    pub fn latest_click_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Option<NotificationEvent>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM notification_events
                 WHERE kind = 'clicked' AND occurred_at >= ?1
                 ORDER BY occurred_at DESC LIMIT 1"
            ))?;
            let mut rows = stmt.query([since.to_rfc3339()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_event(row)?)),
                None => Ok(None),
            }
        })
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> Result<NotificationEvent, StoreError> {
    let kind: String = row_helpers::get(row, 3, "notification_events", "kind")?;
    let occurred_at: String = row_helpers::get(row, 4, "notification_events", "occurred_at")?;

    Ok(NotificationEvent {
        id: NotificationEventId::from_raw(row_helpers::get::<String>(
            row,
            0,
            "notification_events",
            "id",
        )?),
        notification_id: NotificationId::from_raw(row_helpers::get::<String>(
            row,
            1,
            "notification_events",
            "notification_id",
        )?),
        app_id: AppId::from_raw(row_helpers::get::<String>(
            row,
            2,
            "notification_events",
            "app_id",
        )?),
        kind: row_helpers::parse_enum(&kind, "notification_events", "kind")?,
        occurred_at: row_helpers::parse_timestamp(
            &occurred_at,
            "notification_events",
            "occurred_at",
        )?,
    })
}
