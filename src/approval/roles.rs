//! Role lookup.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::approval::types::{Actor, ApprovalResult, Role};

/// Read-only source of role assignments.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn roles_of(&self, actor: &Actor) -> ApprovalResult<Vec<Role>>;

    /// Highest role held, `User` for unknown actors.
    async fn highest_role(&self, actor: &Actor) -> ApprovalResult<Role> {
        Ok(self
            .roles_of(actor)
            .await?
            .into_iter()
            .max()
            .unwrap_or(Role::User))
    }
}

/// Assignments fixed at startup from the `[roles]` table.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleDirectory {
    assignments: HashMap<String, Vec<Role>>,
}

impl StaticRoleDirectory {
    pub fn new(assignments: HashMap<String, Vec<Role>>) -> Self {
        Self { assignments }
    }

    /// Build from configuration. Unknown tags are skipped; validation has
    /// already reported them.
    pub fn from_config(roles: &BTreeMap<String, Vec<String>>) -> Self {
        let assignments = roles
            .iter()
            .map(|(actor, tags)| {
                let parsed = tags.iter().filter_map(|t| t.parse().ok()).collect();
                (actor.clone(), parsed)
            })
            .collect();
        Self { assignments }
    }

    pub fn with_role(mut self, actor: &str, role: Role) -> Self {
        self.assignments.entry(actor.to_string()).or_default().push(role);
        self
    }
}

#[async_trait]
impl RoleDirectory for StaticRoleDirectory {
    async fn roles_of(&self, actor: &Actor) -> ApprovalResult<Vec<Role>> {
        Ok(self.assignments.get(&actor.id).cloned().unwrap_or_default())
    }
}
