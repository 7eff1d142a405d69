use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExecError, ExecResult};

/// Terminal record for an item that exhausted its retry budget. Entries are
/// resolved by humans or by automated follow-up, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub queue_item_id: String,
    pub workflow_id: String,
    pub failure_count: u32,
    pub last_error: String,
    pub execution_data: Value,
    #[serde(default)]
    pub investigated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn add(&self, entry: DeadLetterEntry) -> ExecResult<()>;

    async fn get(&self, queue_item_id: &str) -> ExecResult<Option<DeadLetterEntry>>;

    async fn list_unresolved(&self) -> ExecResult<Vec<DeadLetterEntry>>;

    /// Mark an entry investigated with resolution notes. The entry stays in
    /// the store.
    async fn resolve(
        &self,
        queue_item_id: &str,
        notes: &str,
        resolved_at: DateTime<Utc>,
    ) -> ExecResult<()>;
}

#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    entries: tokio::sync::RwLock<HashMap<String, DeadLetterEntry>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn add(&self, entry: DeadLetterEntry) -> ExecResult<()> {
        self.entries
            .write()
            .await
            .insert(entry.queue_item_id.clone(), entry);
        Ok(())
    }

    async fn get(&self, queue_item_id: &str) -> ExecResult<Option<DeadLetterEntry>> {
        Ok(self.entries.read().await.get(queue_item_id).cloned())
    }

    async fn list_unresolved(&self) -> ExecResult<Vec<DeadLetterEntry>> {
        let mut unresolved: Vec<DeadLetterEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|entry| entry.resolved_at.is_none())
            .cloned()
            .collect();
        unresolved.sort_by(|a, b| a.queue_item_id.cmp(&b.queue_item_id));
        Ok(unresolved)
    }

    async fn resolve(
        &self,
        queue_item_id: &str,
        notes: &str,
        resolved_at: DateTime<Utc>,
    ) -> ExecResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(queue_item_id)
            .ok_or_else(|| ExecError::ItemNotFound(queue_item_id.to_string()))?;
        entry.investigated = true;
        entry.resolution_notes = Some(notes.to_string());
        entry.resolved_at = Some(resolved_at);
        Ok(())
    }
}
