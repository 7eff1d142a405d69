use thiserror::Error;

use crate::model::NodeId;

/// Compilation-level errors. All of these block compilation entirely and are
/// never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Cycle detected in workflow graph: {}", path.join(" -> "))]
    CycleDetected { path: Vec<NodeId> },
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),
    #[error("Node {node} depends on unknown node: {dependency}")]
    UnknownDependency { node: NodeId, dependency: NodeId },
    #[error("Edge references unknown node: {0}")]
    UnknownEdgeEndpoint(NodeId),
    #[error("Workflow has no nodes")]
    EmptyWorkflow,
}

impl CompileError {
    /// The offending cycle, when this is a cycle error. The path is closed:
    /// first and last entries name the same node.
    pub fn cycle_path(&self) -> Option<&[NodeId]> {
        match self {
            CompileError::CycleDetected { path } => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_display_includes_path() {
        let err = CompileError::CycleDetected {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cycle detected in workflow graph: a -> b -> a"
        );
        assert_eq!(err.cycle_path().unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_dependency_display() {
        let err = CompileError::UnknownDependency {
            node: "fetch".into(),
            dependency: "missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "Node fetch depends on unknown node: missing"
        );
    }
}
