//! Pending-change queue.
//!
//! Decisions are conditional transitions out of `pending`. Whoever flips the
//! status first owns the decision; later reviewers see `AlreadyDecided`.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::approval::types::{
    ApprovalError, ApprovalResult, ChangeStatus, DecisionRecord, PendingChange,
};

#[async_trait]
pub trait ChangeQueue: Send + Sync {
    async fn enqueue(&self, change: PendingChange) -> ApprovalResult<()>;

    async fn get(&self, id: Uuid) -> ApprovalResult<Option<PendingChange>>;

    /// Changes in the given status, oldest first. `None` lists everything.
    async fn list(&self, status: Option<ChangeStatus>) -> ApprovalResult<Vec<PendingChange>>;

    /// Move `pending` to `decided` and return the updated change.
    async fn claim(
        &self,
        id: Uuid,
        decided: ChangeStatus,
        record: DecisionRecord,
    ) -> ApprovalResult<PendingChange>;

    /// Undo a claim whose follow-up failed.
    async fn release(&self, id: Uuid) -> ApprovalResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryChangeQueue {
    changes: DashMap<Uuid, PendingChange>,
}

impl InMemoryChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChangeQueue for InMemoryChangeQueue {
    async fn enqueue(&self, change: PendingChange) -> ApprovalResult<()> {
        self.changes.insert(change.id, change);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> ApprovalResult<Option<PendingChange>> {
        Ok(self.changes.get(&id).map(|c| c.value().clone()))
    }

    async fn list(&self, status: Option<ChangeStatus>) -> ApprovalResult<Vec<PendingChange>> {
        let mut changes: Vec<PendingChange> = self
            .changes
            .iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .map(|c| c.value().clone())
            .collect();
        changes.sort_by_key(|c| c.created_at);
        Ok(changes)
    }

    async fn claim(
        &self,
        id: Uuid,
        decided: ChangeStatus,
        record: DecisionRecord,
    ) -> ApprovalResult<PendingChange> {
        // The shard lock held by get_mut makes check-and-set atomic.
        let mut entry = self.changes.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
        if entry.status != ChangeStatus::Pending {
            return Err(ApprovalError::AlreadyDecided {
                id,
                status: entry.status,
            });
        }
        entry.status = decided;
        entry.decision = Some(record);
        Ok(entry.value().clone())
    }

    async fn release(&self, id: Uuid) -> ApprovalResult<()> {
        let mut entry = self.changes.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
        entry.status = ChangeStatus::Pending;
        entry.decision = None;
        Ok(())
    }
}
