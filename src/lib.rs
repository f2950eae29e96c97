//! Engagement attribution and prompt scheduling for push notifications.
//!
//! The [`Sdk`] facade sits inside a long-lived client session: the host
//! feeds it page lifecycle events, push deliveries, and outcome names; the
//! engines attribute each outcome to notification activity (direct >
//! indirect > unattributed, deduplicated per session) and decide when a
//! permission prompt gets its single display.
//!
//! ```no_run
//! use std::sync::Arc;
//! use beacon::platform::{DeviceType, StaticPlatform, SubscriptionState};
//! use beacon::{load_config, Sdk};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(std::path::Path::new("beacon.json"))?;
//! let sdk = Sdk::builder(config)
//!     .with_platform(Arc::new(StaticPlatform {
//!         device: DeviceType::Desktop,
//!         subscription: SubscriptionState::Subscribed,
//!     }))
//!     .build()?;
//!
//! sdk.init().await?;
//! sdk.page_view().await?;
//! sdk.send_outcome("purchase").await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod sdk;

pub use config::{deep_merge, load_config, ConfigError};
pub use sdk::{Sdk, SdkBuilder, SdkError};

pub use beacon_core::config::{PromptKind, SdkConfig};
pub use beacon_core::events::SdkEvent;
pub use beacon_core::ids::NotificationId;
pub use beacon_core::outcomes::OutcomeReport;
pub use beacon_core::platform;
pub use beacon_core::transport::{OutcomeTransport, PromptPresenter};
pub use beacon_engine::ReportDisposition;
pub use beacon_store::Database;
pub use beacon_telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};
