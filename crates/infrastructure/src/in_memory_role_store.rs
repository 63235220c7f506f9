use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use rolesync_application::RoleStore;
use rolesync_core::{AppError, AppResult};
use rolesync_domain::{Member, Role};

/// In-memory role store implementation.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<BTreeMap<String, Role>>,
    members: RwLock<BTreeMap<String, Member>>,
}

impl InMemoryRoleStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with roles and members.
    ///
    /// Roles without an identifier are assigned one.
    #[must_use]
    pub fn seeded(roles: Vec<Role>, members: Vec<Member>) -> Self {
        let roles = roles
            .into_iter()
            .map(|role| {
                let role = match role.id() {
                    Some(_) => role,
                    None => role.with_id(Uuid::new_v4().to_string()),
                };
                (role.name().to_owned(), role)
            })
            .collect();
        let members = members
            .into_iter()
            .map(|member| (member.identity.clone(), member))
            .collect();

        Self {
            roles: RwLock::new(roles),
            members: RwLock::new(members),
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled("in-memory store call was cancelled".to_owned()));
    }

    Ok(())
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn list_roles(&self, cancel: &CancellationToken) -> AppResult<Vec<Role>> {
        ensure_active(cancel)?;
        Ok(self.roles.read().await.values().cloned().collect())
    }

    async fn find_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<Option<Role>> {
        ensure_active(cancel)?;
        Ok(self.roles.read().await.get(name).cloned())
    }

    async fn create_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role> {
        ensure_active(cancel)?;
        let mut roles = self.roles.write().await;

        if roles.contains_key(role.name()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name()
            )));
        }

        let created = role.clone().with_id(Uuid::new_v4().to_string());
        roles.insert(created.name().to_owned(), created.clone());
        Ok(created)
    }

    async fn update_role(&self, role: &Role, cancel: &CancellationToken) -> AppResult<Role> {
        ensure_active(cancel)?;
        let mut roles = self.roles.write().await;

        let stored = roles
            .values_mut()
            .find(|stored| role.id().is_some_and(|id| stored.id() == Some(id)))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "role '{}' with id '{}' does not exist",
                    role.name(),
                    role.id().unwrap_or("<none>")
                ))
            })?;

        if stored.name() != role.name() {
            return Err(AppError::Validation(format!(
                "role '{}' cannot be renamed to '{}'",
                stored.name(),
                role.name()
            )));
        }

        *stored = role.clone();
        Ok(role.clone())
    }

    async fn delete_role(&self, name: &str, cancel: &CancellationToken) -> AppResult<()> {
        ensure_active(cancel)?;
        let removed = self
            .roles
            .write()
            .await
            .remove(name)
            .ok_or_else(|| AppError::NotFound(format!("role '{name}' does not exist")))?;

        if let Some(role_id) = removed.id() {
            for member in self.members.write().await.values_mut() {
                member.role_ids.remove(role_id);
            }
        }

        Ok(())
    }

    async fn list_members(&self, cancel: &CancellationToken) -> AppResult<Vec<Member>> {
        ensure_active(cancel)?;
        Ok(self.members.read().await.values().cloned().collect())
    }

    async fn invite_member(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        ensure_active(cancel)?;
        let mut members = self.members.write().await;

        if members.contains_key(identity) {
            return Err(AppError::Conflict(format!(
                "member '{identity}' already exists"
            )));
        }

        let mut member = Member::new(identity);
        member.role_ids.insert(role_id.to_owned());
        members.insert(identity.to_owned(), member);
        Ok(())
    }

    async fn assign_member_role(
        &self,
        identity: &str,
        role_id: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        ensure_active(cancel)?;
        let role_exists = self
            .roles
            .read()
            .await
            .values()
            .any(|role| role.id() == Some(role_id));
        if !role_exists {
            return Err(AppError::NotFound(format!("role id '{role_id}' does not exist")));
        }

        self.members
            .write()
            .await
            .get_mut(identity)
            .ok_or_else(|| AppError::NotFound(format!("member '{identity}' does not exist")))?
            .role_ids
            .insert(role_id.to_owned());
        Ok(())
    }
}
