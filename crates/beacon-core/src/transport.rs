use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::ids::{AppId, PlayerId};
use crate::outcomes::OutcomeReport;
use crate::platform::DeviceType;

/// Server acknowledgement of an outcome submission.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OutcomeAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Player (device registration) upsert sent at bootstrap.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpsert {
    pub app_id: AppId,
    pub device_type: DeviceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAck {
    pub success: bool,
    pub player_id: PlayerId,
}

/// Outbound REST surface consumed by the engines. Failures propagate as
/// errors; nothing here retries.
#[async_trait]
pub trait OutcomeTransport: Send + Sync {
    async fn send_outcome(&self, report: &OutcomeReport) -> Result<OutcomeAck, TransportError>;

    async fn upsert_player(&self, player: &PlayerUpsert) -> Result<PlayerAck, TransportError>;
}

/// Prompt-UI hand-off. Rendering and the permission-request flow are entirely
/// the implementor's responsibility; the scheduler only decides *when*.
#[async_trait]
pub trait PromptPresenter: Send + Sync {
    async fn display(&self, kind: crate::config::PromptKind);
}
