use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Terminal alongside `Completed`; dead-lettered items are never
    /// re-enqueued automatically.
    DeadLetter,
}

/// One unit of queued work: a workflow execution request. Created by
/// triggers, mutated only by the queue processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub workflow_id: String,
    pub workspace_id: String,
    /// Routing key for circuit-breaker gating, when the execution targets a
    /// specific integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    #[serde(default)]
    pub priority: i32,
    pub scheduled_at: DateTime<Utc>,
    pub status: QueueItemStatus,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    pub execution_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// What a trigger hands the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub workflow_id: String,
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub execution_data: Value,
    /// Defaults to the queue's configured retry budget when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl EnqueueRequest {
    pub fn new(workflow_id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        EnqueueRequest {
            workflow_id: workflow_id.into(),
            workspace_id: workspace_id.into(),
            integration: None,
            priority: 0,
            execution_data: Value::Null,
            max_retries: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_integration(mut self, integration: impl Into<String>) -> Self {
        self.integration = Some(integration.into());
        self
    }

    pub fn with_execution_data(mut self, data: Value) -> Self {
        self.execution_data = data;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Why a claimed item was put back without dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    CircuitOpen { integration: String },
    RateLimited,
}

/// Terminal outcome of one item within one processing cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ItemDisposition {
    Completed,
    RetryScheduled {
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    DeadLettered,
    Skipped {
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub queue_item_id: String,
    pub workflow_id: String,
    pub disposition: ItemDisposition,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structured result of one `process_cycle` call. `processed` counts items
/// actually dispatched; gate-skipped items appear in `results` but not in
/// the count.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub processed: usize,
    pub results: Vec<ItemOutcome>,
}
