//! Deployment engine: validation, process execution and the orchestration sequence

pub mod compose;
pub mod fsm;
pub mod git;
pub mod instance;
pub mod log_sink;
pub mod orchestrator;
pub mod ports;
pub mod process;
pub mod supervisor;
pub mod validate;

pub use orchestrator::{Orchestrator, OrchestratorOptions};

use crate::errors::DaemonError;

/// Attribute a failure to the step it happened in.
///
/// Validation rejections and cancellations keep their own kind.
pub(crate) fn stage_error(wrap: fn(String) -> DaemonError) -> impl Fn(DaemonError) -> DaemonError {
    move |err| match err {
        DaemonError::ValidationRejected(_) | DaemonError::Cancelled(_) => err,
        other => wrap(other.to_string()),
    }
}
