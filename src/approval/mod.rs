//! Change-approval routing.
//!
//! # Data Flow
//! ```text
//! POST /admin/changes (X-Actor-Id)
//!     → router.rs (resolve highest role)
//!         super_admin → tables.rs (apply now)
//!         admin       → queue.rs (pending change)
//!         otherwise   → PermissionDenied
//!
//! POST /admin/changes/{id}/approve|reject
//!     → router.rs (super_admin only)
//!     → queue.rs (claim pending → decided)
//!     → tables.rs (apply on approval; release claim on failure)
//! ```

pub mod queue;
pub mod roles;
pub mod router;
pub mod tables;
pub mod types;

pub use queue::{ChangeQueue, InMemoryChangeQueue};
pub use roles::{RoleDirectory, StaticRoleDirectory};
pub use router::ChangeRouter;
pub use tables::{ChangeApplier, TableStore};
pub use types::{
    ActionKind, Actor, ApplyOutcome, ApprovalError, ApprovalResult, ChangeRequest, ChangeStatus,
    Decision, DecisionRecord, PendingChange, Role, UnknownRole,
};
