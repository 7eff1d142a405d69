use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};

use crate::error::CompileError;
use crate::model::{NodeId, Workflow};

/// The dependency graph of one workflow: nodes keyed by id, edges pointing
/// from a dependency to its dependent. Node indices follow the input order of
/// the definition, which is what makes compilation deterministic.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: StableDiGraph<NodeId, ()>,
    index_map: HashMap<NodeId, NodeIndex>,
    order: Vec<NodeId>,
}

impl DependencyGraph {
    /// Node ids in definition input order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_map.contains_key(id)
    }

    /// Position of a node in the definition input order.
    pub fn input_position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|n| n == id)
    }

    /// Direct dependencies of `id`, in input order.
    pub fn predecessors(&self, id: &str) -> Vec<NodeId> {
        self.neighbors(id, petgraph::Direction::Incoming)
    }

    /// Direct dependents of `id`, in input order.
    pub fn successors(&self, id: &str) -> Vec<NodeId> {
        self.neighbors(id, petgraph::Direction::Outgoing)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.index_map
            .get(id)
            .map(|idx| {
                self.graph
                    .neighbors_directed(*idx, petgraph::Direction::Incoming)
                    .count()
            })
            .unwrap_or(0)
    }

    fn neighbors(&self, id: &str, direction: petgraph::Direction) -> Vec<NodeId> {
        let Some(idx) = self.index_map.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(*idx, direction).collect();
        // petgraph yields neighbors in reverse insertion order; node indices
        // were assigned in input order, so sorting restores it.
        out.sort();
        out.iter()
            .filter_map(|n| self.graph.node_weight(*n).cloned())
            .collect()
    }
}

/// Build the dependency graph from a workflow definition. Edges come from
/// both the explicit edge list and each node's `dependencies`; duplicates
/// collapse into a single edge so in-degree counting stays correct.
pub fn build_graph(workflow: &Workflow) -> Result<DependencyGraph, CompileError> {
    let mut graph = StableDiGraph::new();
    let mut index_map: HashMap<NodeId, NodeIndex> = HashMap::new();
    let mut order = Vec::with_capacity(workflow.nodes.len());

    for node in &workflow.nodes {
        if index_map.contains_key(&node.id) {
            return Err(CompileError::DuplicateNode(node.id.clone()));
        }
        let idx = graph.add_node(node.id.clone());
        index_map.insert(node.id.clone(), idx);
        order.push(node.id.clone());
    }

    let mut seen_edges: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    let mut link = |graph: &mut StableDiGraph<NodeId, ()>, from: NodeIndex, to: NodeIndex| {
        if seen_edges.insert((from, to)) {
            graph.add_edge(from, to, ());
        }
    };

    for node in &workflow.nodes {
        let to = index_map[&node.id];
        for dependency in node.dependencies() {
            let from = *index_map.get(dependency).ok_or_else(|| {
                CompileError::UnknownDependency {
                    node: node.id.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            link(&mut graph, from, to);
        }
    }

    for edge in &workflow.edges {
        let from = *index_map
            .get(&edge.from)
            .ok_or_else(|| CompileError::UnknownEdgeEndpoint(edge.from.clone()))?;
        let to = *index_map
            .get(&edge.to)
            .ok_or_else(|| CompileError::UnknownEdgeEndpoint(edge.to.clone()))?;
        link(&mut graph, from, to);
    }

    Ok(DependencyGraph {
        graph,
        index_map,
        order,
    })
}
