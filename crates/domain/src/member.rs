use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identity known to the remote authority together with the roles it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member identity, usually an email address.
    pub identity: String,
    /// Identifiers of roles currently assigned to the member.
    #[serde(default)]
    pub role_ids: BTreeSet<String>,
}

impl Member {
    /// Creates a member without role assignments.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            role_ids: BTreeSet::new(),
        }
    }

    /// Returns whether the member already holds the role.
    #[must_use]
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.contains(role_id)
    }
}
