use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::NodeExecutionError;
use crate::model::Node;

/// The external collaborator that actually runs a node. The queue sequences,
/// protects, and retries these calls; it never looks inside them.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, node: &Node, input: &Value) -> Result<Value, NodeExecutionError>;
}

/// Echo executor for wiring tests and dry runs.
pub struct StubExecutor;

#[async_trait]
impl NodeExecutor for StubExecutor {
    async fn execute(&self, node: &Node, input: &Value) -> Result<Value, NodeExecutionError> {
        Ok(json!({
            "node_id": node.id,
            "echo": input,
        }))
    }
}
