use serde::{Deserialize, Serialize};

use crate::ids::{AppId, NotificationId};
use crate::platform::DeviceType;

/// Finished attribution report handed to the transport. Constructed fresh per
/// reported outcome and never mutated afterwards.
///
/// Wire shape: camelCase, with `notificationIds` omitted when empty and
/// `direct`/`weight` omitted when absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub app_id: AppId,
    /// The outcome name as reported by the host application.
    pub id: String,
    pub device_type: DeviceType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notification_ids: Vec<NotificationId>,
    /// `Some(true)` for direct attribution, `Some(false)` for indirect,
    /// `None` for unattributed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}
