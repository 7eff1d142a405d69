//! Error taxonomy for the compilation and execution pipeline.
//!
//! Compilation errors are fatal and surface synchronously to the caller;
//! queue-level transient errors (`CircuitOpen`, `RateLimitExceeded`) are
//! handled inside the queue via skip-and-retry and never escape to trigger
//! callers; executor failures are wrapped as [`NodeExecutionError`] and drive
//! the retry/backoff/dead-letter machinery.

mod compile_error;
mod exec_error;
mod node_error;

pub use compile_error::CompileError;
pub use exec_error::ExecError;
pub use node_error::NodeExecutionError;

/// Result alias for the execution path.
pub type ExecResult<T> = Result<T, ExecError>;
