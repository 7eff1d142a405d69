use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ExecError, ExecResult};

use super::item::{QueueItem, QueueItemStatus};

/// Persistence seam for queue items. The production implementation sits on
/// the relational store; the in-memory one below backs tests and single
/// process deployments.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn enqueue(&self, item: QueueItem) -> ExecResult<()>;

    /// Select and claim up to `limit` due items in one atomic step: items
    /// where `status = pending`, or `status = failed` with `next_retry_at <=
    /// now`, ordered by priority descending then `scheduled_at` ascending.
    /// Claimed items transition to `processing` before they are returned, so
    /// two concurrent pollers can never claim the same item.
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> ExecResult<Vec<QueueItem>>;

    async fn update(&self, item: &QueueItem) -> ExecResult<()>;

    async fn get(&self, id: &str) -> ExecResult<Option<QueueItem>>;
}

#[derive(Default)]
pub struct InMemoryQueueStore {
    items: tokio::sync::RwLock<HashMap<String, QueueItem>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_due(item: &QueueItem, now: DateTime<Utc>) -> bool {
    match item.status {
        QueueItemStatus::Pending => true,
        QueueItemStatus::Failed => item
            .next_retry_at
            .map(|at| at <= now)
            .unwrap_or(true),
        _ => false,
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn enqueue(&self, item: QueueItem) -> ExecResult<()> {
        self.items.write().await.insert(item.id.clone(), item);
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> ExecResult<Vec<QueueItem>> {
        // One write lock across select-and-mark keeps the claim exclusive.
        let mut items = self.items.write().await;

        let mut due: Vec<&QueueItem> = items.values().filter(|item| is_due(item, now)).collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.scheduled_at.cmp(&b.scheduled_at))
                .then(a.id.cmp(&b.id))
        });
        let claimed_ids: Vec<String> = due.iter().take(limit).map(|item| item.id.clone()).collect();

        let mut claimed = Vec::with_capacity(claimed_ids.len());
        for id in claimed_ids {
            if let Some(item) = items.get_mut(&id) {
                item.status = QueueItemStatus::Processing;
                claimed.push(item.clone());
            }
        }
        Ok(claimed)
    }

    async fn update(&self, item: &QueueItem) -> ExecResult<()> {
        let mut items = self.items.write().await;
        if !items.contains_key(&item.id) {
            return Err(ExecError::ItemNotFound(item.id.clone()));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> ExecResult<Option<QueueItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }
}
