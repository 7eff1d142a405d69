//! The CRUD seam to the persistent workflow-definition store. The real
//! backend is the platform's relational store; the in-memory implementation
//! backs tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ExecResult;
use crate::model::Workflow;

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, workflow_id: &str) -> ExecResult<Option<Workflow>>;

    async fn save(&self, workflow: Workflow) -> ExecResult<()>;
}

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: tokio::sync::RwLock<HashMap<String, Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, workflow_id: &str) -> ExecResult<Option<Workflow>> {
        Ok(self.workflows.read().await.get(workflow_id).cloned())
    }

    async fn save(&self, workflow: Workflow) -> ExecResult<()> {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    #[tokio::test]
    async fn test_save_and_get() {
        let store = InMemoryWorkflowStore::new();
        let workflow = Workflow::new("wf", "test").with_node(Node::trigger("start"));
        store.save(workflow.clone()).await.unwrap();
        assert_eq!(store.get("wf").await.unwrap(), Some(workflow));
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
