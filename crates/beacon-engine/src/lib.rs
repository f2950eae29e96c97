pub mod attribution;
pub mod error;
pub mod gate;
pub mod scheduler;
pub mod tracker;

pub use attribution::{OutcomeAttributionEngine, ReportDisposition};
pub use error::EngineError;
pub use gate::InitGate;
pub use scheduler::{PromptScheduler, PromptTrigger};
pub use tracker::{PageView, SessionTracker};
