use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compiler::{OptimizationLevel, PlanCompiler};
use crate::core::event_bus::{EventEmitter, ExecutionEvent};
use crate::core::runtime_context::RuntimeContext;
use crate::error::{ExecError, ExecResult};
use crate::limits::{CircuitBreakerRegistry, RateLimiter};
use crate::store::WorkflowStore;

use super::dead_letter::{DeadLetterEntry, DeadLetterStore};
use super::item::{
    CycleReport, EnqueueRequest, ItemDisposition, ItemOutcome, QueueItem, QueueItemStatus,
    SkipReason,
};
use super::runner::PlanRunner;
use super::store::QueueStore;

/// Rate-limit resource consumed by one workflow dispatch.
pub const EXECUTION_RESOURCE: &str = "workflow_executions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_base_retry_delay_secs")]
    pub base_retry_delay_secs: u64,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    #[serde(default)]
    pub optimization_level: OptimizationLevel,
}

fn default_batch_size() -> usize {
    10
}

fn default_base_retry_delay_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            batch_size: default_batch_size(),
            base_retry_delay_secs: default_base_retry_delay_secs(),
            default_max_retries: default_max_retries(),
            optimization_level: OptimizationLevel::default(),
        }
    }
}

/// The queue's polling processor. Invoked on a timer; each cycle claims a
/// batch of due items, gates them against breaker and rate-limit state,
/// dispatches through the plan runner, and settles every claimed item as
/// completed, retry-scheduled, dead-lettered, or released.
///
/// Transient gate refusals never surface to callers; only exhausted retries
/// become visible, as dead-letter records.
pub struct QueueProcessor {
    store: Arc<dyn QueueStore>,
    dead_letters: Arc<dyn DeadLetterStore>,
    workflows: Arc<dyn WorkflowStore>,
    compiler: Arc<PlanCompiler>,
    runner: PlanRunner,
    rate_limiter: Arc<RateLimiter>,
    breakers: Arc<CircuitBreakerRegistry>,
    config: QueueConfig,
    events: EventEmitter,
    context: RuntimeContext,
}

#[allow(clippy::too_many_arguments)]
impl QueueProcessor {
    pub fn new(
        store: Arc<dyn QueueStore>,
        dead_letters: Arc<dyn DeadLetterStore>,
        workflows: Arc<dyn WorkflowStore>,
        compiler: Arc<PlanCompiler>,
        runner: PlanRunner,
        rate_limiter: Arc<RateLimiter>,
        breakers: Arc<CircuitBreakerRegistry>,
        config: QueueConfig,
        events: EventEmitter,
        context: RuntimeContext,
    ) -> Self {
        QueueProcessor {
            store,
            dead_letters,
            workflows,
            compiler,
            runner,
            rate_limiter,
            breakers,
            config,
            events,
            context,
        }
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterStore> {
        &self.dead_letters
    }

    /// Create a pending queue item from a trigger request.
    pub async fn enqueue(&self, request: EnqueueRequest) -> ExecResult<String> {
        let item = QueueItem {
            id: self.context.next_id(),
            workflow_id: request.workflow_id,
            workspace_id: request.workspace_id,
            integration: request.integration,
            priority: request.priority,
            scheduled_at: self.context.now_utc(),
            status: QueueItemStatus::Pending,
            retry_count: 0,
            max_retries: request.max_retries.unwrap_or(self.config.default_max_retries),
            next_retry_at: None,
            execution_data: request.execution_data,
            error_message: None,
        };
        let id = item.id.clone();
        self.store.enqueue(item).await?;
        Ok(id)
    }

    /// One polling cycle: claim, gate, dispatch, settle.
    pub async fn process_cycle(&self) -> ExecResult<CycleReport> {
        let now = self.context.now_utc();
        let batch = self.store.claim_due(now, self.config.batch_size).await?;
        let mut results = Vec::with_capacity(batch.len());

        for mut item in batch {
            if let Some(reason) = self.gate(&item) {
                self.release(&mut item, &reason).await?;
                results.push(ItemOutcome {
                    queue_item_id: item.id.clone(),
                    workflow_id: item.workflow_id.clone(),
                    disposition: ItemDisposition::Skipped { reason },
                    duration_ms: 0,
                    error: None,
                });
                continue;
            }

            let started = self.context.now_millis();
            let dispatched = self.dispatch(&item).await;
            let duration_ms = (self.context.now_millis() - started).max(0) as u64;

            let outcome = match dispatched {
                Ok(_) => self.settle_success(&mut item, duration_ms).await?,
                Err(error) => self.settle_failure(&mut item, error, duration_ms).await?,
            };
            results.push(outcome);
        }

        let processed = results
            .iter()
            .filter(|outcome| !matches!(outcome.disposition, ItemDisposition::Skipped { .. }))
            .count();
        Ok(CycleReport { processed, results })
    }

    /// Pre-dispatch checks. A refusal leaves the item pending for the next
    /// poll; it carries no penalty.
    fn gate(&self, item: &QueueItem) -> Option<SkipReason> {
        if let Some(integration) = &item.integration {
            if !self.breakers.breaker(integration).is_call_permitted() {
                return Some(SkipReason::CircuitOpen {
                    integration: integration.clone(),
                });
            }
        }
        if !self
            .rate_limiter
            .can_make_request(&item.workspace_id, EXECUTION_RESOURCE)
        {
            return Some(SkipReason::RateLimited);
        }
        None
    }

    async fn release(&self, item: &mut QueueItem, reason: &SkipReason) -> ExecResult<()> {
        item.status = QueueItemStatus::Pending;
        self.store.update(item).await?;
        tracing::debug!(
            queue_item = %item.id,
            reason = ?reason,
            "item released back to pending"
        );
        self.events.emit(ExecutionEvent::ItemSkipped {
            queue_item_id: item.id.clone(),
            reason: reason.clone(),
            timestamp: self.context.now_utc(),
        });
        Ok(())
    }

    async fn dispatch(&self, item: &QueueItem) -> ExecResult<Value> {
        let workflow = self
            .workflows
            .get(&item.workflow_id)
            .await?
            .ok_or_else(|| ExecError::WorkflowNotFound(item.workflow_id.clone()))?;
        let outcome = self
            .compiler
            .compile(&workflow, self.config.optimization_level)?;
        self.runner.run(&workflow, &outcome.plan, item).await
    }

    async fn settle_success(
        &self,
        item: &mut QueueItem,
        duration_ms: u64,
    ) -> ExecResult<ItemOutcome> {
        item.status = QueueItemStatus::Completed;
        item.error_message = None;
        self.store.update(item).await?;
        self.rate_limiter
            .record_request(&item.workspace_id, EXECUTION_RESOURCE);
        tracing::debug!(
            queue_item = %item.id,
            workflow_id = %item.workflow_id,
            duration_ms,
            "item completed"
        );
        self.events.emit(ExecutionEvent::ItemCompleted {
            queue_item_id: item.id.clone(),
            workflow_id: item.workflow_id.clone(),
            duration_ms,
            timestamp: self.context.now_utc(),
        });
        Ok(ItemOutcome {
            queue_item_id: item.id.clone(),
            workflow_id: item.workflow_id.clone(),
            disposition: ItemDisposition::Completed,
            duration_ms,
            error: None,
        })
    }

    /// Canonical retry policy: exhausted items dead-letter; everything else
    /// reschedules at `base_delay * 2^retry_count`, then the count
    /// increments. With the defaults (60s base, 3 retries) that yields
    /// delays of 60s, 120s, 240s and a dead letter on the fourth failure.
    async fn settle_failure(
        &self,
        item: &mut QueueItem,
        error: ExecError,
        duration_ms: u64,
    ) -> ExecResult<ItemOutcome> {
        let message = error.to_string();

        if item.retry_count >= item.max_retries {
            item.status = QueueItemStatus::DeadLetter;
            item.error_message = Some(message.clone());
            self.store.update(item).await?;
            self.dead_letters
                .add(DeadLetterEntry {
                    queue_item_id: item.id.clone(),
                    workflow_id: item.workflow_id.clone(),
                    failure_count: item.retry_count + 1,
                    last_error: message.clone(),
                    execution_data: item.execution_data.clone(),
                    investigated: false,
                    resolution_notes: None,
                    resolved_at: None,
                })
                .await?;
            tracing::warn!(
                queue_item = %item.id,
                workflow_id = %item.workflow_id,
                error = %message,
                "item dead-lettered after exhausting retries"
            );
            self.events.emit(ExecutionEvent::ItemDeadLettered {
                queue_item_id: item.id.clone(),
                workflow_id: item.workflow_id.clone(),
                error: message.clone(),
                timestamp: self.context.now_utc(),
            });
            return Ok(ItemOutcome {
                queue_item_id: item.id.clone(),
                workflow_id: item.workflow_id.clone(),
                disposition: ItemDisposition::DeadLettered,
                duration_ms,
                error: Some(message),
            });
        }

        let delay_secs = self
            .config
            .base_retry_delay_secs
            .saturating_mul(1u64 << item.retry_count.min(32));
        let next_retry_at = self.context.now_utc() + Duration::seconds(delay_secs as i64);
        item.retry_count += 1;
        item.status = QueueItemStatus::Failed;
        item.next_retry_at = Some(next_retry_at);
        item.error_message = Some(message.clone());
        self.store.update(item).await?;
        tracing::debug!(
            queue_item = %item.id,
            retry_count = item.retry_count,
            delay_secs,
            error = %message,
            "item retry scheduled"
        );
        self.events.emit(ExecutionEvent::ItemRetryScheduled {
            queue_item_id: item.id.clone(),
            workflow_id: item.workflow_id.clone(),
            retry_count: item.retry_count,
            next_retry_at,
            error: message.clone(),
            timestamp: self.context.now_utc(),
        });
        Ok(ItemOutcome {
            queue_item_id: item.id.clone(),
            workflow_id: item.workflow_id.clone(),
            disposition: ItemDisposition::RetryScheduled {
                retry_count: item.retry_count,
                next_retry_at,
            },
            duration_ms,
            error: Some(message),
        })
    }
}
