use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AppId, NotificationEventId, NotificationId};

/// Whether the user merely received the notification or clicked through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Received,
    Clicked,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Clicked => write!(f, "clicked"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(Self::Received),
            "clicked" => Ok(Self::Clicked),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// Append-only record of a push delivery or click. Immutable once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: NotificationEventId,
    pub notification_id: NotificationId,
    pub app_id: AppId,
    pub kind: NotificationKind,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn received(notification_id: NotificationId, app_id: AppId, at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationEventId::new(),
            notification_id,
            app_id,
            kind: NotificationKind::Received,
            occurred_at: at,
        }
    }

    pub fn clicked(notification_id: NotificationId, app_id: AppId, at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationEventId::new(),
            notification_id,
            app_id,
            kind: NotificationKind::Clicked,
            occurred_at: at,
        }
    }
}
