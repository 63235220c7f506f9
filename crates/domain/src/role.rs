use std::collections::BTreeSet;

use rolesync_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Access-control role: a named bundle of resource patterns and member identities.
///
/// Pattern and member collections are sets, so declaration order and
/// duplicates never influence comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: NonEmptyString,
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
    members: BTreeSet<String>,
}

impl Role {
    /// Creates a role without resources or members.
    pub fn new(name: impl Into<String>) -> AppResult<Self> {
        let name = NonEmptyString::new(name.into().trim())
            .map_err(|_| AppError::Validation("role name must not be empty".to_owned()))?;

        Ok(Self {
            id: None,
            name,
            allowed: BTreeSet::new(),
            denied: BTreeSet::new(),
            members: BTreeSet::new(),
        })
    }

    /// Attaches the identifier assigned by the remote authority.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Replaces the allowed resource patterns.
    #[must_use]
    pub fn with_allowed<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the denied resource patterns.
    #[must_use]
    pub fn with_denied<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the member identities.
    #[must_use]
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the remote identifier, if known.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the unique role name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns allowed resource patterns in sorted order.
    #[must_use]
    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    /// Returns denied resource patterns in sorted order.
    #[must_use]
    pub fn denied(&self) -> &BTreeSet<String> {
        &self.denied
    }

    /// Returns member identities in sorted order.
    #[must_use]
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    /// Returns whether both roles declare the same name, resources and members.
    ///
    /// The remote identifier is metadata and is ignored.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.name == other.name
            && self.allowed == other.allowed
            && self.denied == other.denied
            && self.members == other.members
    }
}

impl TryFrom<RoleRecord> for Role {
    type Error = AppError;

    fn try_from(record: RoleRecord) -> Result<Self, Self::Error> {
        let role = Self::new(record.name)?;
        let members = record.members.unwrap_or_default();

        if let Some(blank) = members.iter().find(|member| member.trim().is_empty()) {
            return Err(AppError::Validation(format!(
                "role '{}' declares an empty member identity '{blank}'",
                role.name()
            )));
        }

        let role = role
            .with_allowed(record.resources.allowed.unwrap_or_default())
            .with_denied(record.resources.denied.unwrap_or_default())
            .with_members(members.into_iter().map(|member| member.trim().to_owned()));

        Ok(match record.id {
            Some(id) => role.with_id(id),
            None => role,
        })
    }
}

/// Serialized role shape shared by role files and the remote API.
///
/// ```yaml
/// name: editor
/// resources:
///   allowed: [read, write]
///   denied: []
/// members: [a@x.com]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleRecord {
    /// Remote identifier; absent in role files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unique role name.
    pub name: String,
    /// Resource patterns.
    #[serde(default)]
    pub resources: ResourceRecord,
    /// Optional member identities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

/// Allow and deny lists of a serialized role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Allowed resource patterns.
    #[serde(default)]
    pub allowed: Option<Vec<String>>,
    /// Denied resource patterns.
    #[serde(default)]
    pub denied: Option<Vec<String>>,
}

impl From<&Role> for RoleRecord {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id.clone(),
            name: role.name().to_owned(),
            resources: ResourceRecord {
                allowed: Some(role.allowed.iter().cloned().collect()),
                denied: Some(role.denied.iter().cloned().collect()),
            },
            members: (!role.members.is_empty())
                .then(|| role.members.iter().cloned().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ResourceRecord, Role, RoleRecord};

    #[test]
    fn equivalence_ignores_order_and_remote_id() {
        let local = Role::new("editor").map(|role| {
            role.with_allowed(["write", "read"])
                .with_members(["b@x.com", "a@x.com"])
        });
        let remote = Role::new("editor").map(|role| {
            role.with_id("role-17")
                .with_allowed(["read", "write", "read"])
                .with_members(["a@x.com", "b@x.com"])
        });

        assert!(matches!(
            (&local, &remote),
            (Ok(local), Ok(remote)) if local.is_equivalent(remote)
        ));
    }

    #[test]
    fn missing_lists_equal_empty_lists() {
        let nil = Role::try_from(RoleRecord {
            name: "viewer".to_owned(),
            ..RoleRecord::default()
        });
        let empty = Role::try_from(RoleRecord {
            id: None,
            name: "viewer".to_owned(),
            resources: ResourceRecord {
                allowed: Some(Vec::new()),
                denied: Some(Vec::new()),
            },
            members: Some(Vec::new()),
        });

        assert!(matches!(
            (&nil, &empty),
            (Ok(nil), Ok(empty)) if nil.is_equivalent(empty)
        ));
    }

    #[test]
    fn blank_role_name_is_rejected() {
        assert!(Role::new("  ").is_err());
    }

    #[test]
    fn blank_member_identity_is_rejected() {
        let result = Role::try_from(RoleRecord {
            name: "ops".to_owned(),
            members: Some(vec!["a@x.com".to_owned(), " ".to_owned()]),
            ..RoleRecord::default()
        });

        assert!(result.is_err());
    }

    #[test]
    fn record_keeps_remote_identifier() {
        let record = RoleRecord {
            id: Some("42".to_owned()),
            name: "admin".to_owned(),
            ..RoleRecord::default()
        };
        let role = Role::try_from(record);

        assert_eq!(role.ok().as_ref().and_then(Role::id), Some("42"));
    }

    #[test]
    fn record_omits_members_when_none_declared() {
        let role = Role::new("admin").map(|role| role.with_allowed(["*"]));
        let json = role
            .as_ref()
            .map(|role| serde_json::to_value(RoleRecord::from(role)));

        assert!(matches!(
            json,
            Ok(Ok(value)) if value.get("members").is_none()
                && value["resources"]["allowed"] == serde_json::json!(["*"])
        ));
    }
}
