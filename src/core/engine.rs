use std::sync::Arc;

use crate::compiler::PlanCompiler;
use crate::config::EngineConfig;
use crate::healing::{HealingLogStore, SelfHealer};
use crate::limits::{CircuitBreakerRegistry, RateLimiter};
use crate::queue::{
    DeadLetterStore, InMemoryDeadLetterStore, InMemoryQueueStore, NodeExecutor, PlanRunner,
    QueueProcessor, QueueStore,
};
use crate::store::{InMemoryWorkflowStore, WorkflowStore};

use super::event_bus::{EventEmitter, EventSender};
use super::runtime_context::RuntimeContext;

/// One wired instance of the execution core: compiler, queue processor,
/// gates, and healer sharing the same stores, event emitter, and runtime
/// context.
pub struct Engine {
    workflows: Arc<dyn WorkflowStore>,
    compiler: Arc<PlanCompiler>,
    rate_limiter: Arc<RateLimiter>,
    breakers: Arc<CircuitBreakerRegistry>,
    healing_log: Arc<HealingLogStore>,
    queue: Arc<QueueProcessor>,
    healer: Arc<SelfHealer>,
}

impl Engine {
    pub fn builder(executor: Arc<dyn NodeExecutor>) -> EngineBuilder {
        EngineBuilder::new(executor)
    }

    pub fn workflows(&self) -> &Arc<dyn WorkflowStore> {
        &self.workflows
    }

    pub fn compiler(&self) -> &Arc<PlanCompiler> {
        &self.compiler
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn healing_log(&self) -> &Arc<HealingLogStore> {
        &self.healing_log
    }

    pub fn queue(&self) -> &Arc<QueueProcessor> {
        &self.queue
    }

    pub fn healer(&self) -> &Arc<SelfHealer> {
        &self.healer
    }
}

pub struct EngineBuilder {
    executor: Arc<dyn NodeExecutor>,
    config: EngineConfig,
    context: RuntimeContext,
    workflows: Option<Arc<dyn WorkflowStore>>,
    queue_store: Option<Arc<dyn QueueStore>>,
    dead_letters: Option<Arc<dyn DeadLetterStore>>,
    event_tx: Option<EventSender>,
}

impl EngineBuilder {
    pub fn new(executor: Arc<dyn NodeExecutor>) -> Self {
        EngineBuilder {
            executor,
            config: EngineConfig::default(),
            context: RuntimeContext::default(),
            workflows: None,
            queue_store: None,
            dead_letters: None,
            event_tx: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(mut self, context: RuntimeContext) -> Self {
        self.context = context;
        self
    }

    pub fn workflow_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.workflows = Some(store);
        self
    }

    pub fn queue_store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.queue_store = Some(store);
        self
    }

    pub fn dead_letter_store(mut self, store: Arc<dyn DeadLetterStore>) -> Self {
        self.dead_letters = Some(store);
        self
    }

    /// Attach an event channel; without one, emission is a no-op.
    pub fn event_sender(mut self, tx: EventSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn build(self) -> Engine {
        let events = match self.event_tx {
            Some(tx) => EventEmitter::new(tx),
            None => EventEmitter::detached(),
        };
        let workflows = self
            .workflows
            .unwrap_or_else(|| Arc::new(InMemoryWorkflowStore::new()));
        let queue_store = self
            .queue_store
            .unwrap_or_else(|| Arc::new(InMemoryQueueStore::new()));
        let dead_letters = self
            .dead_letters
            .unwrap_or_else(|| Arc::new(InMemoryDeadLetterStore::new()));

        let compiler = Arc::new(PlanCompiler::new(self.context.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(
            self.config.rate_limit,
            self.context.time_provider.clone(),
        ));
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            self.config.circuit_breaker,
            self.context.time_provider.clone(),
            events.clone(),
        ));
        let healing_log = Arc::new(HealingLogStore::new());

        let runner = PlanRunner::new(
            self.executor,
            breakers.clone(),
            events.clone(),
            self.context.clone(),
        );
        let queue = Arc::new(QueueProcessor::new(
            queue_store,
            dead_letters,
            workflows.clone(),
            compiler.clone(),
            runner,
            rate_limiter.clone(),
            breakers.clone(),
            self.config.queue,
            events.clone(),
            self.context.clone(),
        ));
        let healer = Arc::new(SelfHealer::new(
            workflows.clone(),
            breakers.clone(),
            healing_log.clone(),
            events,
            self.context,
        ));

        Engine {
            workflows,
            compiler,
            rate_limiter,
            breakers,
            healing_log,
            queue,
            healer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::StubExecutor;

    #[test]
    fn test_builder_defaults() {
        let engine = Engine::builder(Arc::new(StubExecutor)).build();
        assert_eq!(engine.compiler().cache().stats().total_entries, 0);
    }
}
