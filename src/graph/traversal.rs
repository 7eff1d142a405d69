use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::NodeId;

use super::builder::DependencyGraph;

/// Kahn's algorithm over the dependency graph. Among simultaneously-ready
/// nodes the one earliest in definition input order goes first, which makes
/// the result deterministic for a given definition.
///
/// Assumes the graph is acyclic (validated beforehand); leftover nodes from a
/// cycle are simply not emitted.
pub fn topological_order(graph: &DependencyGraph) -> Vec<NodeId> {
    let ids = graph.node_ids();
    let pos_of: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(pos, id)| (id.as_str(), pos))
        .collect();
    let mut in_degree: Vec<usize> = ids.iter().map(|id| graph.in_degree(id)).collect();

    // Ready set keyed by input position, so `pop_first` always yields the
    // earliest-defined ready node.
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(pos, _)| pos)
        .collect();

    let mut order = Vec::with_capacity(ids.len());
    while let Some(pos) = ready.pop_first() {
        let id = &ids[pos];
        order.push(id.clone());

        for successor in graph.successors(id) {
            if let Some(&succ_pos) = pos_of.get(successor.as_str()) {
                in_degree[succ_pos] = in_degree[succ_pos].saturating_sub(1);
                if in_degree[succ_pos] == 0 {
                    ready.insert(succ_pos);
                }
            }
        }
    }

    order
}

/// Ready-layer sweep: each round collects every node whose dependencies are
/// already placed, in input order. Rounds with more than one member are the
/// compiler's parallel groups. This is a greedy approximation of maximum
/// parallelism, not critical-path scheduling.
pub fn ready_layers(graph: &DependencyGraph) -> Vec<Vec<NodeId>> {
    let mut placed: HashSet<NodeId> = HashSet::new();
    let mut layers = Vec::new();

    while placed.len() < graph.len() {
        let layer: Vec<NodeId> = graph
            .node_ids()
            .iter()
            .filter(|id| !placed.contains(*id))
            .filter(|id| {
                graph
                    .predecessors(id)
                    .iter()
                    .all(|pred| placed.contains(pred))
            })
            .cloned()
            .collect();

        if layer.is_empty() {
            // Only possible on a cyclic graph; the validator rejects those
            // before we get here.
            break;
        }
        placed.extend(layer.iter().cloned());
        layers.push(layer);
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::model::{Node, Workflow};

    fn fan_workflow() -> Workflow {
        // a -> b -> c, with d and e independent.
        Workflow::new("wf", "fan")
            .with_node(Node::data("a"))
            .with_node(Node::data("b").with_dependencies(["a"]))
            .with_node(Node::data("c").with_dependencies(["b"]))
            .with_node(Node::data("d"))
            .with_node(Node::data("e"))
    }

    #[test]
    fn test_topological_order_respects_input_order() {
        let graph = build_graph(&fan_workflow()).unwrap();
        let order = topological_order(&graph);
        assert_eq!(order, vec!["a", "d", "e", "b", "c"]);
    }

    #[test]
    fn test_ready_layers() {
        let graph = build_graph(&fan_workflow()).unwrap();
        let layers = ready_layers(&graph);
        assert_eq!(
            layers,
            vec![
                vec!["a".to_string(), "d".to_string(), "e".to_string()],
                vec!["b".to_string()],
                vec!["c".to_string()],
            ]
        );
    }

    #[test]
    fn test_diamond_layers() {
        let workflow = Workflow::new("wf", "diamond")
            .with_node(Node::trigger("start"))
            .with_node(Node::data("left").with_dependencies(["start"]))
            .with_node(Node::data("right").with_dependencies(["start"]))
            .with_node(Node::data("join").with_dependencies(["left", "right"]));
        let graph = build_graph(&workflow).unwrap();
        let layers = ready_layers(&graph);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[1], vec!["left".to_string(), "right".to_string()]);
        assert_eq!(layers[2], vec!["join".to_string()]);
    }
}
