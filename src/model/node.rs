use serde::{Deserialize, Serialize};

pub type NodeId = String;

/// Retry policy attached to a node's configuration. Injected or strengthened
/// by the self-healer; honored by whichever executor runs the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_secs() -> u64 {
    60
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

/// Fields every node type carries. `dependencies` lists the node ids this
/// node must run after; the rest are resilience knobs the self-healer may
/// adjust.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonNodeConfig {
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_node: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Webhook,
    Schedule,
    #[default]
    Manual,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub kind: TriggerKind,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub operation: String,
    /// Read-only actions have no side effects and are safe to cache.
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub expression: String,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub transform: String,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

fn default_model() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub integration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorHandlerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(flatten)]
    pub common: CommonNodeConfig,
}

/// Per-type node configuration. The stored JSON shape is
/// `{"type": "...", "config": {...}}`; unknown types or malformed configs
/// fail at deserialization time instead of surfacing mid-execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum NodeConfig {
    Trigger(TriggerConfig),
    Action(ActionConfig),
    Condition(ConditionConfig),
    Data(DataConfig),
    Ai(AiConfig),
    Connector(ConnectorConfig),
    ErrorHandler(ErrorHandlerConfig),
    Validator(ValidatorConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Action,
    Condition,
    Data,
    Ai,
    Connector,
    ErrorHandler,
    Validator,
}

impl NodeKind {
    /// Baseline wall-clock cost used by the compiler's duration estimate.
    pub fn baseline_cost_ms(self) -> u64 {
        match self {
            NodeKind::Trigger => 10,
            NodeKind::Condition => 20,
            NodeKind::Validator => 30,
            NodeKind::ErrorHandler => 30,
            NodeKind::Data => 120,
            NodeKind::Action => 450,
            NodeKind::Connector => 700,
            NodeKind::Ai => 1800,
        }
    }
}

/// A single workflow node: an opaque unit of work identified by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub config: NodeConfig,
}

impl Node {
    pub fn trigger(id: impl Into<NodeId>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::Trigger(TriggerConfig::default()),
        }
    }

    pub fn action(id: impl Into<NodeId>, operation: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::Action(ActionConfig {
                operation: operation.into(),
                read_only: false,
                integration: None,
                common: CommonNodeConfig::default(),
            }),
        }
    }

    pub fn condition(id: impl Into<NodeId>, expression: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::Condition(ConditionConfig {
                expression: expression.into(),
                common: CommonNodeConfig::default(),
            }),
        }
    }

    pub fn data(id: impl Into<NodeId>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::Data(DataConfig::default()),
        }
    }

    pub fn ai(id: impl Into<NodeId>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::Ai(AiConfig {
                model: default_model(),
                prompt: None,
                common: CommonNodeConfig::default(),
            }),
        }
    }

    pub fn connector(id: impl Into<NodeId>, integration: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::Connector(ConnectorConfig {
                integration: integration.into(),
                operation: None,
                common: CommonNodeConfig::default(),
            }),
        }
    }

    pub fn error_handler(id: impl Into<NodeId>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::ErrorHandler(ErrorHandlerConfig::default()),
        }
    }

    pub fn validator(id: impl Into<NodeId>) -> Self {
        Node {
            id: id.into(),
            config: NodeConfig::Validator(ValidatorConfig::default()),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.common_mut().dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.common_mut().timeout_secs = Some(secs);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.common_mut().retry = Some(retry);
        self
    }

    pub fn with_integration(mut self, integration: impl Into<String>) -> Self {
        if let NodeConfig::Action(action) = &mut self.config {
            action.integration = Some(integration.into());
        }
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        if let NodeConfig::Action(action) = &mut self.config {
            action.read_only = read_only;
        }
        self
    }

    pub fn kind(&self) -> NodeKind {
        match &self.config {
            NodeConfig::Trigger(_) => NodeKind::Trigger,
            NodeConfig::Action(_) => NodeKind::Action,
            NodeConfig::Condition(_) => NodeKind::Condition,
            NodeConfig::Data(_) => NodeKind::Data,
            NodeConfig::Ai(_) => NodeKind::Ai,
            NodeConfig::Connector(_) => NodeKind::Connector,
            NodeConfig::ErrorHandler(_) => NodeKind::ErrorHandler,
            NodeConfig::Validator(_) => NodeKind::Validator,
        }
    }

    pub fn common(&self) -> &CommonNodeConfig {
        match &self.config {
            NodeConfig::Trigger(c) => &c.common,
            NodeConfig::Action(c) => &c.common,
            NodeConfig::Condition(c) => &c.common,
            NodeConfig::Data(c) => &c.common,
            NodeConfig::Ai(c) => &c.common,
            NodeConfig::Connector(c) => &c.common,
            NodeConfig::ErrorHandler(c) => &c.common,
            NodeConfig::Validator(c) => &c.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut CommonNodeConfig {
        match &mut self.config {
            NodeConfig::Trigger(c) => &mut c.common,
            NodeConfig::Action(c) => &mut c.common,
            NodeConfig::Condition(c) => &mut c.common,
            NodeConfig::Data(c) => &mut c.common,
            NodeConfig::Ai(c) => &mut c.common,
            NodeConfig::Connector(c) => &mut c.common,
            NodeConfig::ErrorHandler(c) => &mut c.common,
            NodeConfig::Validator(c) => &mut c.common,
        }
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.common().dependencies
    }

    /// The integration this node dispatches to, if any. Connector nodes
    /// always name one; actions may.
    pub fn integration(&self) -> Option<&str> {
        match &self.config {
            NodeConfig::Connector(c) => Some(&c.integration),
            NodeConfig::Action(a) => a.integration.as_deref(),
            _ => None,
        }
    }

    /// A node is cacheable if it is a pure data/AI transform or a read-only
    /// action. Decided from the declared config alone, never from execution
    /// history.
    pub fn is_cacheable(&self) -> bool {
        match &self.config {
            NodeConfig::Data(_) | NodeConfig::Ai(_) => true,
            NodeConfig::Action(a) => a.read_only,
            _ => false,
        }
    }

    pub fn baseline_cost_ms(&self) -> u64 {
        self.kind().baseline_cost_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_roundtrip() {
        let node = Node::action("fetch", "orders.fetch")
            .with_integration("shopify")
            .with_dependencies(["start"])
            .with_timeout_secs(30);

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "action");
        assert_eq!(value["config"]["operation"], "orders.fetch");
        assert_eq!(value["config"]["dependencies"], json!(["start"]));

        let back: Node = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_deserialize_from_stored_shape() {
        let node: Node = serde_json::from_value(json!({
            "id": "classify",
            "type": "ai",
            "config": { "model": "gpt-4", "dependencies": ["fetch"] }
        }))
        .unwrap();
        assert_eq!(node.kind(), NodeKind::Ai);
        assert_eq!(node.dependencies(), ["fetch".to_string()]);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<Node, _> = serde_json::from_value(json!({
            "id": "x",
            "type": "subroutine",
            "config": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_cacheable_predicate() {
        assert!(Node::data("d").is_cacheable());
        assert!(Node::ai("a").is_cacheable());
        assert!(Node::action("r", "read").read_only(true).is_cacheable());
        assert!(!Node::action("w", "write").is_cacheable());
        assert!(!Node::connector("c", "stripe").is_cacheable());
        assert!(!Node::trigger("t").is_cacheable());
    }

    #[test]
    fn test_integration_lookup() {
        assert_eq!(Node::connector("c", "stripe").integration(), Some("stripe"));
        assert_eq!(
            Node::action("a", "op").with_integration("hubspot").integration(),
            Some("hubspot")
        );
        assert_eq!(Node::data("d").integration(), None);
    }
}
