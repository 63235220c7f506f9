use std::collections::{BTreeSet, HashSet};

use rolesync_core::{AppError, AppResult};
use serde::Serialize;

use crate::Role;

/// Desired and current state of a role that needs an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleUpdate {
    name: String,
    local: Role,
    remote: Role,
}

impl RoleUpdate {
    /// Pairs a local definition with its remote counterpart.
    pub fn new(local: Role, remote: Role) -> AppResult<Self> {
        if local.name() != remote.name() {
            return Err(AppError::Validation(format!(
                "cannot pair local role '{}' with remote role '{}'",
                local.name(),
                remote.name()
            )));
        }

        Ok(Self {
            name: local.name().to_owned(),
            local,
            remote,
        })
    }

    /// Returns the shared role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the desired definition.
    #[must_use]
    pub fn local(&self) -> &Role {
        &self.local
    }

    /// Returns the definition currently held by the remote authority.
    #[must_use]
    pub fn remote(&self) -> &Role {
        &self.remote
    }

    /// Returns the local definition carrying the remote identifier, ready to send.
    #[must_use]
    pub fn desired(&self) -> Role {
        match self.remote.id() {
            Some(id) => self.local.clone().with_id(id),
            None => self.local.clone(),
        }
    }

    /// Returns per-collection additions and removals.
    #[must_use]
    pub fn changes(&self) -> RoleChanges {
        RoleChanges {
            allowed: SetChange::between(self.remote.allowed(), self.local.allowed()),
            denied: SetChange::between(self.remote.denied(), self.local.denied()),
            members: SetChange::between(self.remote.members(), self.local.members()),
        }
    }
}

/// Difference between the remote and local collections of one role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RoleChanges {
    /// Allowed pattern changes.
    pub allowed: SetChange,
    /// Denied pattern changes.
    pub denied: SetChange,
    /// Member changes.
    pub members: SetChange,
}

/// Values added to and removed from one set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SetChange {
    /// Values present locally but not remotely.
    pub added: Vec<String>,
    /// Values present remotely but not locally.
    pub removed: Vec<String>,
}

impl SetChange {
    fn between(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            added: desired.difference(current).cloned().collect(),
            removed: current.difference(desired).cloned().collect(),
        }
    }

    /// Returns whether the set is unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Operations required to make the remote role set match the local one.
///
/// Every list is sorted by role name and a name appears in at most one list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChangePlan {
    creates: Vec<Role>,
    updates: Vec<RoleUpdate>,
    deletes: Vec<String>,
}

impl ChangePlan {
    /// Builds a plan, sorting each list and rejecting names planned twice.
    pub fn new(
        mut creates: Vec<Role>,
        mut updates: Vec<RoleUpdate>,
        mut deletes: Vec<String>,
    ) -> AppResult<Self> {
        creates.sort_by(|left, right| left.name().cmp(right.name()));
        updates.sort_by(|left, right| left.name().cmp(right.name()));
        deletes.sort();

        let mut seen = HashSet::new();
        let names = creates
            .iter()
            .map(Role::name)
            .chain(updates.iter().map(RoleUpdate::name))
            .chain(deletes.iter().map(String::as_str));
        for name in names {
            if !seen.insert(name) {
                return Err(AppError::Validation(format!(
                    "role '{name}' appears more than once in the change plan"
                )));
            }
        }

        Ok(Self {
            creates,
            updates,
            deletes,
        })
    }

    /// Returns roles to create.
    #[must_use]
    pub fn creates(&self) -> &[Role] {
        &self.creates
    }

    /// Returns roles to update.
    #[must_use]
    pub fn updates(&self) -> &[RoleUpdate] {
        &self.updates
    }

    /// Returns names of roles to delete.
    #[must_use]
    pub fn deletes(&self) -> &[String] {
        &self.deletes
    }

    /// Returns whether the remote state already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Returns planned operation counts.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            creates: self.creates.len(),
            updates: self.updates.len(),
            deletes: self.deletes.len(),
        }
    }
}

/// Planned operation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlanSummary {
    /// Roles to create.
    pub creates: usize,
    /// Roles to update.
    pub updates: usize,
    /// Roles to delete.
    pub deletes: usize,
}

impl PlanSummary {
    /// Returns the total number of planned role operations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}
