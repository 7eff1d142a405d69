use thiserror::Error;

/// Failures surfaced by a [`NodeExecutor`](crate::queue::NodeExecutor) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeExecutionError {
    #[error("Execution failed: {0}")]
    Failed(String),
    #[error("Node execution timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
