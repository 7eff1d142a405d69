use serde::{Deserialize, Serialize};

use super::node::{Node, NodeId};

/// Directed edge: `to` depends on `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Edge {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A stored workflow definition. Dependencies may be declared as explicit
/// edges, per-node dependency lists, or both; the compiler merges them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Workflow {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Distinct integrations referenced by this workflow's nodes, in first
    /// appearance order.
    pub fn integrations(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for node in &self.nodes {
            if let Some(integration) = node.integration() {
                if !seen.iter().any(|s: &String| s == integration) {
                    seen.push(integration.to_string());
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrations_deduplicated() {
        let workflow = Workflow::new("wf", "test")
            .with_node(Node::connector("a", "stripe"))
            .with_node(Node::connector("b", "stripe"))
            .with_node(Node::action("c", "op").with_integration("hubspot"))
            .with_node(Node::data("d"));
        assert_eq!(workflow.integrations(), vec!["stripe", "hubspot"]);
    }

    #[test]
    fn test_node_lookup() {
        let workflow = Workflow::new("wf", "test").with_node(Node::trigger("start"));
        assert!(workflow.node("start").is_some());
        assert!(workflow.node("missing").is_none());
    }
}
