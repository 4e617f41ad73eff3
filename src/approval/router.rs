//! Role-gated routing of administrative changes.
//!
//! # Responsibilities
//! - Decide once, at the boundary, what the actor's highest role is
//! - Super admins mutate directly; admins enqueue for review; others are refused
//! - Reviews are claimed before applying so each change applies at most once
//!
//! # Design Decisions
//! - The direct mutation is a caller-supplied future so any table can be routed
//! - Exactly one of direct mutation or queued change happens per call

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::approval::queue::ChangeQueue;
use crate::approval::roles::RoleDirectory;
use crate::approval::tables::ChangeApplier;
use crate::approval::types::{
    Actor, ApplyOutcome, ApprovalError, ApprovalResult, ChangeRequest, ChangeStatus, Decision,
    DecisionRecord, PendingChange, Role,
};
use crate::observability::metrics;

pub struct ChangeRouter {
    roles: Arc<dyn RoleDirectory>,
    queue: Arc<dyn ChangeQueue>,
}

impl ChangeRouter {
    pub fn new(roles: Arc<dyn RoleDirectory>, queue: Arc<dyn ChangeQueue>) -> Self {
        Self { roles, queue }
    }

    /// Route a change according to the actor's role.
    ///
    /// `direct_apply` runs only for super admins.
    pub async fn apply<T, F, Fut>(
        &self,
        actor: &Actor,
        request: ChangeRequest,
        direct_apply: F,
    ) -> ApprovalResult<ApplyOutcome<T>>
    where
        F: FnOnce(ChangeRequest) -> Fut,
        Fut: Future<Output = ApprovalResult<T>>,
    {
        let role = self.roles.highest_role(actor).await?;

        match role {
            Role::SuperAdmin => {
                tracing::info!(
                    actor = %actor.id,
                    table = %request.table,
                    action = ?request.action,
                    "Applying change directly"
                );
                metrics::record_change_route("direct");
                let applied = direct_apply(request).await?;
                Ok(ApplyOutcome::Applied(applied))
            }
            Role::Admin => {
                let change = PendingChange::new(request, actor);
                self.queue.enqueue(change.clone()).await?;
                tracing::info!(
                    actor = %actor.id,
                    change_id = %change.id,
                    table = %change.request.table,
                    action = ?change.request.action,
                    "Change queued for review"
                );
                metrics::record_change_route("queued");
                Ok(ApplyOutcome::Queued(change))
            }
            Role::User => {
                tracing::warn!(actor = %actor.id, table = %request.table, "Change refused");
                metrics::record_change_route("denied");
                Err(ApprovalError::PermissionDenied {
                    actor: actor.id.clone(),
                    required: Role::Admin,
                })
            }
        }
    }

    /// Decide a queued change. Only super admins may review.
    pub async fn review(
        &self,
        actor: &Actor,
        change_id: Uuid,
        decision: Decision,
        note: Option<String>,
        applier: &dyn ChangeApplier,
    ) -> ApprovalResult<PendingChange> {
        if self.roles.highest_role(actor).await? < Role::SuperAdmin {
            return Err(ApprovalError::PermissionDenied {
                actor: actor.id.clone(),
                required: Role::SuperAdmin,
            });
        }

        let record = DecisionRecord {
            reviewer: actor.id.clone(),
            decided_at: Utc::now(),
            note,
        };
        let claimed = self
            .queue
            .claim(change_id, decision.resulting_status(), record)
            .await?;

        if decision == Decision::Approve {
            if let Err(e) = applier.apply_change(&claimed.request).await {
                tracing::warn!(change_id = %change_id, error = %e, "Approved change failed to apply; releasing");
                if let Err(release_err) = self.queue.release(change_id).await {
                    tracing::error!(change_id = %change_id, error = %release_err, "Failed to release change claim");
                }
                return Err(e);
            }
        }

        tracing::info!(
            change_id = %change_id,
            reviewer = %actor.id,
            decision = ?decision,
            "Change reviewed"
        );
        Ok(claimed)
    }

    pub async fn pending(&self) -> ApprovalResult<Vec<PendingChange>> {
        self.queue.list(Some(ChangeStatus::Pending)).await
    }

    pub async fn get(&self, change_id: Uuid) -> ApprovalResult<PendingChange> {
        self.queue
            .get(change_id)
            .await?
            .ok_or(ApprovalError::NotFound(change_id))
    }
}
