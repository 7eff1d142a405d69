use std::sync::Arc;

use thiserror::Error;

use crate::core::event_bus::{EventEmitter, EventReceiver, ExecutionEvent};
use crate::core::runtime_context::RuntimeContext;
use crate::limits::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::model::{Node, NodeKind, RetryPolicy, Workflow};
use crate::store::WorkflowStore;

use super::classifier::{classify, error_signature};
use super::log::{HealingLogEntry, HealingLogStore, LearnedOptimization};
use super::strategy::HealingStrategy;

/// Timeout injected where a node has none.
const INITIAL_TIMEOUT_SECS: u64 = 60;
/// Ceiling the timeout escalation converges at.
const MAX_TIMEOUT_SECS: u64 = 300;
/// Retry policy injected or raised to by `retry_with_backoff`.
const HEALED_RETRY: RetryPolicy = RetryPolicy {
    max_retries: 5,
    backoff_secs: 120,
};
/// Protective breaker profile applied by the `circuit_breaker` strategy.
const PROTECTIVE_BREAKER: CircuitBreakerConfig = CircuitBreakerConfig {
    failure_threshold: 3,
    reset_timeout_ms: 60_000,
    half_open_success_threshold: 3,
};

#[derive(Debug, Clone, Error)]
pub enum HealError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// What a healing attempt did.
#[derive(Debug, Clone)]
pub struct HealingReport {
    pub success: bool,
    pub strategy: HealingStrategy,
    pub healing_action: String,
    pub recovery_time_ms: u64,
}

/// Observes execution failures and mutates configuration so the next run
/// fares better: classify the error, select a strategy from a fixed table,
/// apply it idempotently, and record the attempt.
///
/// A failed remediation is logged as unsuccessful but never masks the
/// triggering execution error, which the queue has already surfaced through
/// its own retry or dead-letter path.
pub struct SelfHealer {
    workflows: Arc<dyn WorkflowStore>,
    breakers: Arc<CircuitBreakerRegistry>,
    log: Arc<HealingLogStore>,
    events: EventEmitter,
    context: RuntimeContext,
}

impl SelfHealer {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        breakers: Arc<CircuitBreakerRegistry>,
        log: Arc<HealingLogStore>,
        events: EventEmitter,
        context: RuntimeContext,
    ) -> Self {
        SelfHealer {
            workflows,
            breakers,
            log,
            events,
            context,
        }
    }

    pub fn log(&self) -> &Arc<HealingLogStore> {
        &self.log
    }

    /// Run the classify-select-apply pipeline for one failed execution.
    pub async fn heal(&self, workflow_id: &str, execution_id: &str, error: &str) -> HealingReport {
        let started = self.context.now_millis();
        let kind = classify(error);
        let strategy = HealingStrategy::for_failure(kind);

        let applied = self.apply(workflow_id, strategy).await;
        let recovery_time_ms = (self.context.now_millis() - started).max(0) as u64;

        let (success, healing_action) = match applied {
            Ok(action) => (true, action),
            Err(heal_error) => {
                tracing::warn!(
                    workflow_id,
                    execution_id,
                    strategy = %strategy,
                    error = %heal_error,
                    "healing attempt failed"
                );
                (false, heal_error.to_string())
            }
        };

        self.log
            .append(HealingLogEntry {
                workflow_id: workflow_id.to_string(),
                failure_kind: kind,
                original_error: error.to_string(),
                error_signature: error_signature(error),
                healing_action: healing_action.clone(),
                strategy,
                success,
                recovery_time_ms,
                recorded_at: self.context.now_utc(),
            })
            .await;
        if success {
            self.log
                .append_optimization(LearnedOptimization {
                    workflow_id: workflow_id.to_string(),
                    strategy,
                    estimated_improvement_pct: strategy.estimated_improvement_pct(),
                    recorded_at: self.context.now_utc(),
                })
                .await;
            tracing::info!(
                workflow_id,
                execution_id,
                strategy = %strategy,
                action = %healing_action,
                "healing applied"
            );
        }

        self.events.emit(ExecutionEvent::HealingApplied {
            workflow_id: workflow_id.to_string(),
            strategy,
            success,
            timestamp: self.context.now_utc(),
        });

        HealingReport {
            success,
            strategy,
            healing_action,
            recovery_time_ms,
        }
    }

    /// Feed queue failure events into the healer. Retries are left to the
    /// queue's own backoff; only exhausted items trigger remediation.
    pub async fn run_on_events(self: Arc<Self>, mut receiver: EventReceiver) {
        while let Some(event) = receiver.recv().await {
            if let ExecutionEvent::ItemDeadLettered {
                queue_item_id,
                workflow_id,
                error,
                ..
            } = event
            {
                self.heal(&workflow_id, &queue_item_id, &error).await;
            }
        }
    }

    async fn apply(
        &self,
        workflow_id: &str,
        strategy: HealingStrategy,
    ) -> Result<String, HealError> {
        match strategy {
            HealingStrategy::IncreaseTimeout => self.raise_timeouts(workflow_id).await,
            HealingStrategy::RetryWithBackoff => self.strengthen_retries(workflow_id).await,
            HealingStrategy::CircuitBreaker => self.protect_integrations(workflow_id).await,
            HealingStrategy::FallbackNode => self.attach_fallbacks(workflow_id).await,
        }
    }

    async fn load(&self, workflow_id: &str) -> Result<Workflow, HealError> {
        self.workflows
            .get(workflow_id)
            .await
            .map_err(|e| HealError::Storage(e.to_string()))?
            .ok_or_else(|| HealError::WorkflowNotFound(workflow_id.to_string()))
    }

    async fn save(&self, workflow: Workflow) -> Result<(), HealError> {
        self.workflows
            .save(workflow)
            .await
            .map_err(|e| HealError::Storage(e.to_string()))
    }

    fn is_dispatch_node(node: &Node) -> bool {
        matches!(
            node.kind(),
            NodeKind::Action | NodeKind::Connector | NodeKind::Ai
        )
    }

    /// Double each dispatch node's timeout, floored at 60s and capped at
    /// 300s. Converges: reapplying at the cap changes nothing.
    async fn raise_timeouts(&self, workflow_id: &str) -> Result<String, HealError> {
        let mut workflow = self.load(workflow_id).await?;
        let mut changed = 0usize;
        for node in workflow.nodes.iter_mut().filter(|n| Self::is_dispatch_node(n)) {
            let current = node.common().timeout_secs.unwrap_or(0);
            let target = if current == 0 {
                INITIAL_TIMEOUT_SECS
            } else {
                (current * 2).min(MAX_TIMEOUT_SECS)
            };
            if target > current {
                node.common_mut().timeout_secs = Some(target);
                changed += 1;
            }
        }
        if changed > 0 {
            self.save(workflow).await?;
        }
        Ok(format!("raised timeout on {changed} nodes"))
    }

    /// Inject a stronger retry policy wherever the current one is absent or
    /// weaker. No-op once every dispatch node carries it.
    async fn strengthen_retries(&self, workflow_id: &str) -> Result<String, HealError> {
        let mut workflow = self.load(workflow_id).await?;
        let mut changed = 0usize;
        for node in workflow.nodes.iter_mut().filter(|n| Self::is_dispatch_node(n)) {
            let weaker = node
                .common()
                .retry
                .map(|retry| {
                    retry.max_retries < HEALED_RETRY.max_retries
                        || retry.backoff_secs < HEALED_RETRY.backoff_secs
                })
                .unwrap_or(true);
            if weaker {
                node.common_mut().retry = Some(HEALED_RETRY);
                changed += 1;
            }
        }
        if changed > 0 {
            self.save(workflow).await?;
        }
        Ok(format!("strengthened retry policy on {changed} nodes"))
    }

    /// Apply the protective breaker profile to every integration this
    /// workflow touches. Reapplication overwrites with the same profile.
    async fn protect_integrations(&self, workflow_id: &str) -> Result<String, HealError> {
        let workflow = self.load(workflow_id).await?;
        let integrations = workflow.integrations();
        for integration in &integrations {
            self.breakers.configure(integration, PROTECTIVE_BREAKER);
        }
        Ok(format!(
            "tightened circuit breaker on {} integrations",
            integrations.len()
        ))
    }

    /// Give each dispatch node a fallback error handler. Handler nodes are
    /// keyed by id (`<node>_fallback`), so re-running adds nothing.
    async fn attach_fallbacks(&self, workflow_id: &str) -> Result<String, HealError> {
        let mut workflow = self.load(workflow_id).await?;
        let targets: Vec<String> = workflow
            .nodes
            .iter()
            .filter(|n| Self::is_dispatch_node(n) && n.common().fallback_node.is_none())
            .map(|n| n.id.clone())
            .collect();

        for target in &targets {
            let fallback_id = format!("{target}_fallback");
            if let Some(node) = workflow.node_mut(target) {
                node.common_mut().fallback_node = Some(fallback_id.clone());
            }
            if workflow.node(&fallback_id).is_none() {
                workflow
                    .nodes
                    .push(Node::error_handler(fallback_id).with_dependencies([target.clone()]));
            }
        }
        let changed = targets.len();
        if changed > 0 {
            self.save(workflow).await?;
        }
        Ok(format!("attached fallback handler to {changed} nodes"))
    }
}
