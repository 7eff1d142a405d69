//! Durable, priority-ordered execution queue: atomic item claims, gate
//! checks, dispatch through the plan runner, exponential-backoff retries,
//! and dead-letter routing.

mod dead_letter;
mod executor;
mod item;
mod processor;
mod runner;
mod store;

pub use dead_letter::{DeadLetterEntry, DeadLetterStore, InMemoryDeadLetterStore};
pub use executor::{NodeExecutor, StubExecutor};
pub use item::{
    CycleReport, EnqueueRequest, ItemDisposition, ItemOutcome, QueueItem, QueueItemStatus,
    SkipReason,
};
pub use processor::{QueueConfig, QueueProcessor, EXECUTION_RESOURCE};
pub use runner::PlanRunner;
pub use store::{InMemoryQueueStore, QueueStore};
