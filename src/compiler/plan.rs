use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    #[default]
    Basic,
    /// Same ordering and grouping as `Basic`, but the duration estimate
    /// assumes cache hits for cacheable nodes.
    Aggressive,
}

/// The validated, ordered, parallelized representation of a workflow, ready
/// for execution. Immutable once built; cached by
/// `(workflow_id, version_hash, optimization_level)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPlan {
    pub workflow_id: String,
    /// SHA-256 over the id-sorted node set. Identical node content yields an
    /// identical hash regardless of storage position.
    pub version_hash: String,
    pub optimization_level: OptimizationLevel,
    pub execution_order: Vec<NodeId>,
    /// Sets of mutually independent nodes that may dispatch concurrently.
    /// Only groups with more than one member appear here; singletons are
    /// scheduled individually.
    pub parallel_groups: Vec<Vec<NodeId>>,
    pub cacheable_nodes: Vec<NodeId>,
    pub estimated_duration_ms: u64,
    pub compiled_at: DateTime<Utc>,
}

/// Result of a compile call: the plan, and whether it came from the cache.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub cached: bool,
    pub plan: Arc<CompiledPlan>,
}
