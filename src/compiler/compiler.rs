use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::core::runtime_context::RuntimeContext;
use crate::error::CompileError;
use crate::graph::{build_graph, ready_layers, topological_order, validate_acyclic};
use crate::model::{Node, NodeId, Workflow};

use super::cache::{PlanCache, PlanKey};
use super::plan::{CompileOutcome, CompiledPlan, OptimizationLevel};

/// Residual sequencing overhead assumed when parallel groups execute: the
/// parallel estimate is floored at one fifth of the sequential total plus the
/// per-layer maxima. A heuristic ceiling, not a physical bound.
const PARALLEL_OVERHEAD_DIVISOR: u64 = 5;

/// Cost divisor applied to cacheable nodes under aggressive optimization,
/// which assumes their results come from cache.
const CACHE_HIT_DISCOUNT_DIVISOR: u64 = 10;

/// Compiles workflow definitions into executable plans. Stateless aside from
/// cache writes, so concurrent compilation of different workflows needs no
/// coordination.
pub struct PlanCompiler {
    cache: PlanCache,
    context: RuntimeContext,
}

impl PlanCompiler {
    pub fn new(context: RuntimeContext) -> Self {
        PlanCompiler {
            cache: PlanCache::new(),
            context,
        }
    }

    pub fn cache(&self) -> &PlanCache {
        &self.cache
    }

    /// Compile a workflow, consulting the plan cache first. Identical node
    /// content under the same optimization level returns the stored plan
    /// with `cached = true` and no recomputation. Errors are returned
    /// synchronously and never cached.
    pub fn compile(
        &self,
        workflow: &Workflow,
        level: OptimizationLevel,
    ) -> Result<CompileOutcome, CompileError> {
        if workflow.nodes.is_empty() {
            return Err(CompileError::EmptyWorkflow);
        }

        let version_hash = version_hash(&workflow.nodes);
        let key = PlanKey {
            version_hash: version_hash.clone(),
            optimization_level: level,
        };
        if let Some(plan) = self.cache.get(&workflow.id, &key) {
            return Ok(CompileOutcome { cached: true, plan });
        }

        let plan = Arc::new(self.build_plan(workflow, version_hash, level)?);
        self.cache.insert(&workflow.id, key, plan.clone());
        tracing::debug!(
            workflow_id = %workflow.id,
            version_hash = %plan.version_hash,
            nodes = workflow.nodes.len(),
            groups = plan.parallel_groups.len(),
            "compiled workflow plan"
        );
        Ok(CompileOutcome {
            cached: false,
            plan,
        })
    }

    fn build_plan(
        &self,
        workflow: &Workflow,
        version_hash: String,
        level: OptimizationLevel,
    ) -> Result<CompiledPlan, CompileError> {
        let graph = build_graph(workflow)?;
        validate_acyclic(&graph)?;

        let execution_order = topological_order(&graph);
        let layers = ready_layers(&graph);
        let parallel_groups: Vec<Vec<NodeId>> = layers
            .iter()
            .filter(|layer| layer.len() > 1)
            .cloned()
            .collect();

        let cacheable_nodes: Vec<NodeId> = workflow
            .nodes
            .iter()
            .filter(|node| node.is_cacheable())
            .map(|node| node.id.clone())
            .collect();

        let estimated_duration_ms = estimate_duration_ms(workflow, &layers, level);

        Ok(CompiledPlan {
            workflow_id: workflow.id.clone(),
            version_hash,
            optimization_level: level,
            execution_order,
            parallel_groups,
            cacheable_nodes,
            estimated_duration_ms,
            compiled_at: self.context.now_utc(),
        })
    }
}

/// SHA-256 over the node set serialized in id-sorted order, so the hash is a
/// function of node content alone, not of storage position.
pub fn version_hash(nodes: &[Node]) -> String {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Sha256::new();
    for node in sorted {
        hasher.update(serde_json::to_vec(node).unwrap_or_default());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn estimate_duration_ms(
    workflow: &Workflow,
    layers: &[Vec<NodeId>],
    level: OptimizationLevel,
) -> u64 {
    let cacheable: HashSet<&str> = workflow
        .nodes
        .iter()
        .filter(|node| node.is_cacheable())
        .map(|node| node.id.as_str())
        .collect();

    let cost = |id: &str| -> u64 {
        let base = workflow
            .node(id)
            .map(|node| node.baseline_cost_ms())
            .unwrap_or(0);
        if level == OptimizationLevel::Aggressive && cacheable.contains(id) {
            base / CACHE_HIT_DISCOUNT_DIVISOR
        } else {
            base
        }
    };

    let sequential: u64 = workflow.nodes.iter().map(|node| cost(&node.id)).sum();
    let per_layer_max: u64 = layers
        .iter()
        .map(|layer| layer.iter().map(|id| cost(id)).max().unwrap_or(0))
        .sum();
    let parallel = sequential / PARALLEL_OVERHEAD_DIVISOR + per_layer_max;

    sequential.min(parallel)
}
