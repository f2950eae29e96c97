use serde::{Deserialize, Serialize};

use crate::config::PromptKind;
use crate::ids::{NotificationId, SessionId};

/// Lifecycle events emitted by the SDK facade over a broadcast channel so
/// host applications can observe what the engines decided.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SdkEvent {
    #[serde(rename = "initialized")]
    Initialized,

    #[serde(rename = "session_started")]
    SessionStarted { session_id: SessionId },

    #[serde(rename = "page_view")]
    PageView {
        session_id: SessionId,
        page_views: u64,
    },

    #[serde(rename = "notification_received")]
    NotificationReceived { notification_id: NotificationId },

    #[serde(rename = "notification_clicked")]
    NotificationClicked { notification_id: NotificationId },

    #[serde(rename = "outcome_reported")]
    OutcomeReported {
        outcome_id: String,
        direct: Option<bool>,
        notification_ids: Vec<NotificationId>,
    },

    #[serde(rename = "prompt_displayed")]
    PromptDisplayed { kind: PromptKind },
}

impl SdkEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::SessionStarted { .. } => "session_started",
            Self::PageView { .. } => "page_view",
            Self::NotificationReceived { .. } => "notification_received",
            Self::NotificationClicked { .. } => "notification_clicked",
            Self::OutcomeReported { .. } => "outcome_reported",
            Self::PromptDisplayed { .. } => "prompt_displayed",
        }
    }
}
