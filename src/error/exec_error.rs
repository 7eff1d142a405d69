use thiserror::Error;

use super::{CompileError, NodeExecutionError};

/// Execution-path errors: everything the queue, runner, and stores can
/// produce while driving a compiled plan.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// Transient: the item is skipped and retried on a later poll.
    #[error("Circuit breaker is open for integration: {integration}")]
    CircuitOpen { integration: String },
    /// Transient: the item is skipped and retried on a later poll.
    #[error("Rate limit exceeded for workspace {workspace} on {resource}")]
    RateLimitExceeded { workspace: String, resource: String },
    /// A node executor failed; drives retry/backoff/dead-letter handling.
    #[error("Node {node_id} failed: {source}")]
    NodeExecution {
        node_id: String,
        #[source]
        source: NodeExecutionError,
    },
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    /// A definition that no longer compiles fails the item like any other
    /// execution error, so it flows into retry/dead-letter handling.
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("Queue item not found: {0}")]
    ItemNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
