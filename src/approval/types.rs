//! Change-approval types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Privilege tier. Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Whoever is asking. Passed explicitly into every router call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Insert,
    Update,
    Delete,
}

/// An administrative mutation against a named table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub table: String,
    pub action: ActionKind,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub old_data: Option<serde_json::Value>,
    #[serde(default)]
    pub new_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn resulting_status(&self) -> ChangeStatus {
        match self {
            Decision::Approve => ChangeStatus::Approved,
            Decision::Reject => ChangeStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub reviewer: String,
    pub decided_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A queued change awaiting review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub id: Uuid,
    #[serde(flatten)]
    pub request: ChangeRequest,
    pub requested_by: String,
    pub status: ChangeStatus,
    pub decision: Option<DecisionRecord>,
    pub created_at: DateTime<Utc>,
}

impl PendingChange {
    pub fn new(request: ChangeRequest, requested_by: &Actor) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            requested_by: requested_by.id.clone(),
            status: ChangeStatus::Pending,
            decision: None,
            created_at: Utc::now(),
        }
    }
}

/// Result of routing a change.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome<T> {
    /// Applied immediately; carries whatever the direct mutation returned.
    Applied(T),
    /// Recorded for review; nothing was mutated.
    Queued(PendingChange),
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("actor '{actor}' lacks the {required} role")]
    PermissionDenied { actor: String, required: Role },

    #[error("pending change {0} not found")]
    NotFound(Uuid),

    #[error("change {id} was already {status:?}")]
    AlreadyDecided { id: Uuid, status: ChangeStatus },

    #[error("invalid change: {0}")]
    Invalid(String),

    #[error("change queue unavailable: {0}")]
    Store(String),

    #[error("applying change failed: {0}")]
    Apply(String),
}

pub type ApprovalResult<T> = Result<T, ApprovalError>;
