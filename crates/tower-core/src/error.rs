use std::{error::Error, fmt};

/// Raised from inside an iteration when the cancellation token fires.
///
/// The controller recognizes it with `err.is::<StopRequested>()` and reports `FlowError::Cancelled`
/// instead of a fault.
#[derive(Debug)]
pub struct StopRequested;

impl fmt::Display for StopRequested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stop_requested")
    }
}

impl Error for StopRequested {}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Payload could not be parsed or selects an unsupported flow. No action was attempted.
    #[error("invalid invocation payload: {0}")]
    Config(String),
    #[error("flow cancelled after {iterations} iterations")]
    Cancelled { iterations: u64 },
    #[error("flow fault in iteration {iteration}")]
    Fault {
        iteration: u64,
        #[source]
        source: anyhow::Error,
    },
}

impl FlowError {
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::Config(_) => "config",
            FlowError::Cancelled { .. } => "cancelled",
            FlowError::Fault { .. } => "fault",
        }
    }
}
