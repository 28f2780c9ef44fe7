//! State module: the automation orchestrator and the status board
//!
//! The orchestrator has two states:
//! - Idle: no feature loops running
//! - Running: one loop per enabled feature, started and stopped together

mod machine;
mod status;

pub use machine::{AutomationOrchestrator, ControlCommand};
pub use status::{ListenerHealth, StatusBoard, StatusSnapshot};
