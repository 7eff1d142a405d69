use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::healing::HealingStrategy;
use crate::queue::SkipReason;

/// Execution events emitted by the queue processor, plan runner, circuit
/// breakers, and self-healer. The bus is an explicit instance handed to each
/// component; there is no process-wide listener registry.
#[derive(Clone, Debug, Serialize)]
pub enum ExecutionEvent {
    NodeStarted {
        queue_item_id: String,
        node_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeFinished {
        queue_item_id: String,
        node_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        queue_item_id: String,
        node_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    ItemCompleted {
        queue_item_id: String,
        workflow_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    ItemRetryScheduled {
        queue_item_id: String,
        workflow_id: String,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
        error: String,
        timestamp: DateTime<Utc>,
    },
    ItemDeadLettered {
        queue_item_id: String,
        workflow_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    ItemSkipped {
        queue_item_id: String,
        reason: SkipReason,
        timestamp: DateTime<Utc>,
    },
    CircuitOpened {
        integration: String,
        failure_count: u32,
        timestamp: DateTime<Utc>,
    },
    CircuitClosed {
        integration: String,
        timestamp: DateTime<Utc>,
    },
    HealingApplied {
        workflow_id: String,
        strategy: HealingStrategy,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

pub type EventSender = mpsc::UnboundedSender<ExecutionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Sender wrapper that no-ops when no listener is attached, so emission is
/// free for callers that never wire a channel.
#[derive(Clone, Default)]
pub struct EventEmitter {
    tx: Option<EventSender>,
}

impl EventEmitter {
    pub fn new(tx: EventSender) -> Self {
        EventEmitter { tx: Some(tx) }
    }

    pub fn detached() -> Self {
        EventEmitter { tx: None }
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
