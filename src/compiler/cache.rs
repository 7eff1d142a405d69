use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::plan::{CompiledPlan, OptimizationLevel};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct PlanKey {
    pub version_hash: String,
    pub optimization_level: OptimizationLevel,
}

#[derive(Debug, Clone)]
pub struct PlanCacheStats {
    pub workflow_count: usize,
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Compiled-plan cache, grouped per workflow. Entries never expire on their
/// own: they leave only through the explicit invalidation calls. Concurrent
/// inserts of the same key are idempotent (the content is identical, so last
/// writer wins without data loss).
#[derive(Default)]
pub struct PlanCache {
    plans: DashMap<String, HashMap<PlanKey, Arc<CompiledPlan>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, workflow_id: &str, key: &PlanKey) -> Option<Arc<CompiledPlan>> {
        let found = self
            .plans
            .get(workflow_id)
            .and_then(|group| group.get(key).cloned());
        match &found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, workflow_id: &str, key: PlanKey, plan: Arc<CompiledPlan>) {
        self.plans
            .entry(workflow_id.to_string())
            .or_default()
            .insert(key, plan);
    }

    /// Drop every cached plan for a workflow.
    pub fn invalidate_workflow(&self, workflow_id: &str) {
        self.plans.remove(workflow_id);
    }

    /// Drop the plans for one content version, across optimization levels.
    pub fn invalidate_version(&self, workflow_id: &str, version_hash: &str) {
        if let Some(mut group) = self.plans.get_mut(workflow_id) {
            group.retain(|key, _| key.version_hash != version_hash);
        }
    }

    pub fn clear(&self) {
        self.plans.clear();
    }

    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            workflow_count: self.plans.len(),
            total_entries: self.plans.iter().map(|group| group.len()).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
