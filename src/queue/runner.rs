use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;

use crate::compiler::CompiledPlan;
use crate::core::event_bus::{EventEmitter, ExecutionEvent};
use crate::core::runtime_context::RuntimeContext;
use crate::error::{ExecError, ExecResult, NodeExecutionError};
use crate::limits::{BreakerError, CircuitBreaker, CircuitBreakerRegistry};
use crate::model::{Node, NodeId, Workflow};

use super::executor::NodeExecutor;
use super::item::QueueItem;

/// Drives a compiled plan: parallel groups run concurrently with a strict
/// barrier between groups, singletons run inline, and nodes that name an
/// integration go through that integration's circuit breaker.
pub struct PlanRunner {
    executor: Arc<dyn NodeExecutor>,
    breakers: Arc<CircuitBreakerRegistry>,
    events: EventEmitter,
    context: RuntimeContext,
}

impl PlanRunner {
    pub fn new(
        executor: Arc<dyn NodeExecutor>,
        breakers: Arc<CircuitBreakerRegistry>,
        events: EventEmitter,
        context: RuntimeContext,
    ) -> Self {
        PlanRunner {
            executor,
            breakers,
            events,
            context,
        }
    }

    /// Execute every node of the plan in compiled order. Returns the node
    /// outputs keyed by node id.
    pub async fn run(
        &self,
        workflow: &Workflow,
        plan: &CompiledPlan,
        item: &QueueItem,
    ) -> ExecResult<Value> {
        let mut group_of: HashMap<&str, usize> = HashMap::new();
        for (index, group) in plan.parallel_groups.iter().enumerate() {
            for id in group {
                group_of.insert(id.as_str(), index);
            }
        }
        let mut group_started = vec![false; plan.parallel_groups.len()];
        let mut outputs = serde_json::Map::new();

        for node_id in &plan.execution_order {
            match group_of.get(node_id.as_str()) {
                Some(&index) => {
                    if group_started[index] {
                        continue;
                    }
                    group_started[index] = true;
                    self.run_group(workflow, &plan.parallel_groups[index], item, &mut outputs)
                        .await?;
                }
                None => {
                    let node = self.node(workflow, node_id)?;
                    let value = execute_node(
                        self.executor.clone(),
                        self.breaker_for(&node),
                        self.events.clone(),
                        self.context.clone(),
                        item.id.clone(),
                        node,
                        item.execution_data.clone(),
                    )
                    .await?;
                    outputs.insert(node_id.clone(), value);
                }
            }
        }

        Ok(Value::Object(outputs))
    }

    async fn run_group(
        &self,
        workflow: &Workflow,
        group: &[NodeId],
        item: &QueueItem,
        outputs: &mut serde_json::Map<String, Value>,
    ) -> ExecResult<()> {
        let mut tasks: JoinSet<(NodeId, ExecResult<Value>)> = JoinSet::new();
        for node_id in group {
            let node = self.node(workflow, node_id)?;
            let breaker = self.breaker_for(&node);
            let executor = self.executor.clone();
            let events = self.events.clone();
            let context = self.context.clone();
            let item_id = item.id.clone();
            let input = item.execution_data.clone();
            let id = node_id.clone();
            tasks.spawn(async move {
                let result =
                    execute_node(executor, breaker, events, context, item_id, node, input).await;
                (id, result)
            });
        }

        // Strict barrier: every member reaches a terminal state before the
        // group's result is decided.
        let mut first_error: Option<ExecError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((node_id, Ok(value))) => {
                    outputs.insert(node_id, value);
                }
                Ok((_, Err(error))) => {
                    first_error.get_or_insert(error);
                }
                Err(join_error) => {
                    first_error
                        .get_or_insert(ExecError::Internal(format!("node task failed: {join_error}")));
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn node(&self, workflow: &Workflow, id: &str) -> ExecResult<Node> {
        workflow
            .node(id)
            .cloned()
            .ok_or_else(|| ExecError::Internal(format!("plan references unknown node: {id}")))
    }

    fn breaker_for(&self, node: &Node) -> Option<Arc<CircuitBreaker>> {
        node.integration()
            .map(|integration| self.breakers.breaker(integration))
    }
}

async fn execute_node(
    executor: Arc<dyn NodeExecutor>,
    breaker: Option<Arc<CircuitBreaker>>,
    events: EventEmitter,
    context: RuntimeContext,
    queue_item_id: String,
    node: Node,
    input: Value,
) -> ExecResult<Value> {
    events.emit(ExecutionEvent::NodeStarted {
        queue_item_id: queue_item_id.clone(),
        node_id: node.id.clone(),
        timestamp: context.now_utc(),
    });

    let started = context.now_millis();
    let node_id = node.id.clone();
    let timeout_secs = node.common().timeout_secs;
    let call = async {
        let fut = executor.execute(&node, &input);
        match timeout_secs {
            Some(seconds) => match tokio::time::timeout(Duration::from_secs(seconds), fut).await {
                Ok(result) => result,
                Err(_) => Err(NodeExecutionError::Timeout { seconds }),
            },
            None => fut.await,
        }
    };

    let result = match breaker {
        Some(breaker) => breaker.execute(call).await.map_err(|error| match error {
            BreakerError::Open(integration) => ExecError::CircuitOpen { integration },
            BreakerError::Operation(source) => ExecError::NodeExecution {
                node_id: node_id.clone(),
                source,
            },
        }),
        None => call.await.map_err(|source| ExecError::NodeExecution {
            node_id: node_id.clone(),
            source,
        }),
    };

    let duration_ms = (context.now_millis() - started).max(0) as u64;
    match &result {
        Ok(_) => events.emit(ExecutionEvent::NodeFinished {
            queue_item_id,
            node_id,
            duration_ms,
            timestamp: context.now_utc(),
        }),
        Err(error) => {
            tracing::debug!(node_id = %node_id, error = %error, "node execution failed");
            events.emit(ExecutionEvent::NodeFailed {
                queue_item_id,
                node_id,
                error: error.to_string(),
                timestamp: context.now_utc(),
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{OptimizationLevel, PlanCompiler};
    use crate::limits::CircuitBreakerConfig;
    use crate::queue::item::QueueItemStatus;
    use crate::queue::StubExecutor;
    use chrono::Utc;

    fn runner() -> PlanRunner {
        let context = RuntimeContext::default();
        PlanRunner::new(
            Arc::new(StubExecutor),
            Arc::new(CircuitBreakerRegistry::new(
                CircuitBreakerConfig::default(),
                context.time_provider.clone(),
                EventEmitter::detached(),
            )),
            EventEmitter::detached(),
            context,
        )
    }

    fn sample_item() -> QueueItem {
        QueueItem {
            id: "item-1".to_string(),
            workflow_id: "wf".to_string(),
            workspace_id: "ws".to_string(),
            integration: None,
            priority: 0,
            scheduled_at: Utc::now(),
            status: QueueItemStatus::Processing,
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            execution_data: Value::Null,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_run_produces_output_per_node() {
        let workflow = Workflow::new("wf", "fan")
            .with_node(Node::data("a"))
            .with_node(Node::data("b"))
            .with_node(Node::data("join").with_dependencies(["a", "b"]));
        let compiler = PlanCompiler::new(RuntimeContext::default());
        let plan = compiler
            .compile(&workflow, OptimizationLevel::Basic)
            .unwrap()
            .plan;

        let outputs = runner()
            .run(&workflow, &plan, &sample_item())
            .await
            .unwrap();
        let map = outputs.as_object().unwrap();
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("a") && map.contains_key("b") && map.contains_key("join"));
    }
}
