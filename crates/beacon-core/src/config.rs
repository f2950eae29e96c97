use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::AppId;

/// Full configuration surface, loaded externally and consumed read-only.
/// Every field has a compiled default so partial config files deep-merge
/// cleanly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Application identifier from the dashboard. Required in practice;
    /// the compiled default is empty and fails player registration.
    pub app_id: AppIdField,
    pub session: SessionConfig,
    pub outcomes: OutcomesConfig,
    pub prompts: PromptsConfig,
    pub api: ApiConfig,
}

/// Wrapper so `Default` yields an empty app id instead of a random one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppIdField(pub AppId);

impl Default for AppIdField {
    fn default() -> Self {
        Self(AppId::from_raw(""))
    }
}

impl AppIdField {
    pub fn as_app_id(&self) -> &AppId {
        &self.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity beyond this replaces the session. Default: 30 minutes.
    pub inactivity_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 1800,
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomesConfig {
    pub direct: DirectOutcomeConfig,
    pub indirect: IndirectOutcomeConfig,
    pub unattributed: UnattributedOutcomeConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectOutcomeConfig {
    /// Default: true.
    pub enabled: bool,
}

impl Default for DirectOutcomeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IndirectOutcomeConfig {
    /// Default: true.
    pub enabled: bool,
    /// Receipts this recent still influence an outcome. Default: 1 hour.
    pub lookback_window_secs: u64,
    /// Most-recent-first cap on influencing receipts. Default: 10.
    pub max_notifications: usize,
}

impl Default for IndirectOutcomeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_window_secs: 3600,
            max_notifications: 10,
        }
    }
}

impl IndirectOutcomeConfig {
    pub fn lookback_window(&self) -> Duration {
        Duration::from_secs(self.lookback_window_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UnattributedOutcomeConfig {
    /// Default: true.
    pub enabled: bool,
}

impl Default for UnattributedOutcomeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// The independently configured prompt surfaces.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Slidedown,
    Native,
}

impl PromptKind {
    pub const ALL: [PromptKind; 2] = [PromptKind::Slidedown, PromptKind::Native];
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slidedown => write!(f, "slidedown"),
            Self::Native => write!(f, "native"),
        }
    }
}

impl std::str::FromStr for PromptKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slidedown" => Ok(Self::Slidedown),
            "native" => Ok(Self::Native),
            other => Err(format!("unknown prompt kind: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptRuleConfig {
    /// Prompting is opt-in per surface. Default: false.
    pub enabled: bool,
    /// Evaluate automatically on page views and timer ticks. Default: false.
    pub auto_prompt: bool,
    /// Seconds after arming before the time condition holds. Zero is
    /// satisfied immediately. Default: 0.
    pub time_delay_secs: u64,
    /// Page views required before the prompt may fire. Zero is satisfied by
    /// the first view. Default: 1.
    pub page_views: u64,
}

impl Default for PromptRuleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_prompt: false,
            time_delay_secs: 0,
            page_views: 1,
        }
    }
}

impl PromptRuleConfig {
    pub fn time_delay(&self) -> Duration {
        Duration::from_secs(self.time_delay_secs)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub slidedown: PromptRuleConfig,
    pub native: PromptRuleConfig,
}

impl PromptsConfig {
    pub fn rule(&self, kind: PromptKind) -> &PromptRuleConfig {
        match kind {
            PromptKind::Slidedown => &self.slidedown,
            PromptKind::Native => &self.native,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// REST key for authenticated endpoints. Absent by default.
    pub api_key: Option<String>,
    /// Per-request timeout. Default: 30 s.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.beacon.sh/v1".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
