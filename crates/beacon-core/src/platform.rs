use serde::{Deserialize, Serialize};

/// Device classes reported with an outcome. Detection itself lives behind
/// [`PlatformProbe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Mobile => write!(f, "mobile"),
            Self::Tablet => write!(f, "tablet"),
        }
    }
}

/// Current push-permission standing of this installation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Subscribed,
    NotSubscribed,
    Denied,
}

impl SubscriptionState {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

/// Environment probe consulted at report time. Implementations wrap whatever
/// the embedding runtime exposes (user agent, permission API).
pub trait PlatformProbe: Send + Sync {
    fn device_type(&self) -> DeviceType;
    fn subscription_state(&self) -> SubscriptionState;
}

/// Fixed-answer probe for hosts whose environment does not change at runtime.
#[derive(Clone, Copy, Debug)]
pub struct StaticPlatform {
    pub device: DeviceType,
    pub subscription: SubscriptionState,
}

impl PlatformProbe for StaticPlatform {
    fn device_type(&self) -> DeviceType {
        self.device
    }

    fn subscription_state(&self) -> SubscriptionState {
        self.subscription
    }
}
