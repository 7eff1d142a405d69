//! # flowrun — workflow compilation and resilient execution core
//!
//! `flowrun` is the execution backbone of a workflow automation backend. It
//! takes stored node/edge workflow definitions and:
//!
//! - **Compiles** them into executable plans: cycle detection with full cycle
//!   paths, deterministic topological ordering, parallel-group discovery,
//!   cacheable-node detection, and duration estimation — with plans cached by
//!   content hash and invalidated only explicitly.
//! - **Executes** them through a fault-tolerant polling queue: priority
//!   ordering, atomic item claims, per-workspace rate limiting,
//!   per-integration circuit breakers, exponential-backoff retries, and a
//!   dead-letter store for exhausted items.
//! - **Heals** recurring failures: errors are classified, mapped to a
//!   remediation strategy, and applied as idempotent mutations of the
//!   workflow's node configuration or the integration's breaker profile, with
//!   an append-only healing log.
//!
//! Node bodies are opaque: the crate sequences, protects, and retries units
//! of work behind the [`NodeExecutor`](queue::NodeExecutor) trait but never
//! interprets them.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowrun::{Engine, EnqueueRequest, Node, StubExecutor, Workflow};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::builder(Arc::new(StubExecutor)).build();
//!
//!     let workflow = Workflow::new("wf-1", "sync-orders")
//!         .with_node(Node::trigger("start"))
//!         .with_node(Node::action("fetch", "orders.fetch").with_dependencies(["start"]));
//!     engine.workflows().save(workflow).await.unwrap();
//!
//!     engine
//!         .queue()
//!         .enqueue(EnqueueRequest::new("wf-1", "workspace-1"))
//!         .await
//!         .unwrap();
//!     let report = engine.queue().process_cycle().await.unwrap();
//!     println!("processed {} items", report.processed);
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod core;
pub mod error;
pub mod graph;
pub mod healing;
pub mod limits;
pub mod model;
pub mod queue;
pub mod store;

pub use crate::compiler::{
    CompileOutcome, CompiledPlan, OptimizationLevel, PlanCache, PlanCacheStats, PlanCompiler,
    PlanKey,
};
pub use crate::config::EngineConfig;
pub use crate::core::engine::{Engine, EngineBuilder};
pub use crate::core::event_bus::{
    create_event_channel, EventEmitter, EventReceiver, EventSender, ExecutionEvent,
};
pub use crate::core::runtime_context::{
    IdGenerator, ManualTimeProvider, RuntimeContext, SequenceIdGenerator, SystemTimeProvider,
    TimeProvider, UuidIdGenerator,
};
pub use crate::error::{CompileError, ExecError, ExecResult, NodeExecutionError};
pub use crate::graph::{build_graph, DependencyGraph};
pub use crate::healing::{
    classify, error_signature, FailureKind, HealError, HealingLogEntry, HealingLogStore,
    HealingReport, HealingStrategy, LearnedOptimization, SelfHealer,
};
pub use crate::limits::{
    BreakerError, BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry,
    CircuitState, RateLimitConfig, RateLimiter,
};
pub use crate::model::{
    CommonNodeConfig, Edge, Node, NodeConfig, NodeId, NodeKind, RetryPolicy, TriggerKind, Workflow,
};
pub use crate::queue::{
    CycleReport, DeadLetterEntry, DeadLetterStore, EnqueueRequest, InMemoryDeadLetterStore,
    InMemoryQueueStore, ItemDisposition, ItemOutcome, NodeExecutor, PlanRunner, QueueConfig,
    QueueItem, QueueItemStatus, QueueProcessor, QueueStore, SkipReason, StubExecutor,
};
pub use crate::store::{InMemoryWorkflowStore, WorkflowStore};
