use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classifier::FailureKind;
use super::strategy::HealingStrategy;

/// One healing attempt. The log is append-only; it is the audit trail for
/// dead-letter follow-up and the input to failure-pattern review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingLogEntry {
    pub workflow_id: String,
    pub failure_kind: FailureKind,
    pub original_error: String,
    /// Digits and punctuation normalized out, to group recurring faults.
    pub error_signature: String,
    pub healing_action: String,
    pub strategy: HealingStrategy,
    pub success: bool,
    pub recovery_time_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Recorded when a healing attempt succeeds: which strategy was applied and
/// the fixed improvement estimate for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedOptimization {
    pub workflow_id: String,
    pub strategy: HealingStrategy,
    pub estimated_improvement_pct: u32,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct HealingLogStore {
    entries: tokio::sync::RwLock<Vec<HealingLogEntry>>,
    optimizations: tokio::sync::RwLock<Vec<LearnedOptimization>>,
}

impl HealingLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, entry: HealingLogEntry) {
        self.entries.write().await.push(entry);
    }

    pub async fn append_optimization(&self, optimization: LearnedOptimization) {
        self.optimizations.write().await.push(optimization);
    }

    pub async fn entries(&self) -> Vec<HealingLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entries_for(&self, workflow_id: &str) -> Vec<HealingLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    pub async fn optimizations(&self) -> Vec<LearnedOptimization> {
        self.optimizations.read().await.clone()
    }
}
