use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Unfocused,
    Expired,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Unfocused => write!(f, "unfocused"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "unfocused" => Ok(Self::Unfocused),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One bounded period of page activity. A single session is live at a time;
/// a session whose inactivity exceeds the configured threshold is replaced
/// rather than revived.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    /// Navigation/refresh count, monotone within the session. Starts at 1
    /// with the page view that created the session.
    pub page_views: u64,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self) -> bool {
        self.status != SessionStatus::Expired
    }
}
