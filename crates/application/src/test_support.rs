use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use rolesync_core::{AppError, AppResult};
use rolesync_domain::{Member, Role};

use crate::sync_ports::RoleStore;

type ErrorFactory = Box<dyn Fn() -> AppError + Send + Sync>;

pub(crate) fn role(name: &str) -> Role {
    match Role::new(name) {
        Ok(role) => role,
        Err(error) => panic!("invalid test role '{name}': {error}"),
    }
}

/// Scriptable in-process role store that records every call it receives.
///
/// Call keys: `list_roles`, `find:<name>`, `create:<name>`, `update:<name>`,
/// `delete:<name>`, `list_members`, `invite:<identity>:<role_id>` and
/// `assign:<identity>:<role_id>`.
#[derive(Default)]
pub(crate) struct FakeRoleStore {
    roles: Mutex<Vec<Role>>,
    members: Mutex<Vec<Member>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, (usize, ErrorFactory)>>,
    cancel_after: Mutex<Option<(String, CancellationToken)>>,
}

impl FakeRoleStore {
    pub(crate) fn with_roles(roles: Vec<Role>) -> Self {
        Self {
            roles: Mutex::new(roles),
            ..Self::default()
        }
    }

    pub(crate) async fn add_member(&self, member: Member) {
        self.members.lock().await.push(member);
    }

    pub(crate) async fn fail_times(
        &self,
        call: &str,
        times: usize,
        error: impl Fn() -> AppError + Send + Sync + 'static,
    ) {
        self.failures
            .lock()
            .await
            .insert(call.to_owned(), (times, Box::new(error)));
    }

    /// Cancels `token` once `call` has completed successfully.
    pub(crate) async fn cancel_after(&self, call: &str, token: CancellationToken) {
        *self.cancel_after.lock().await = Some((call.to_owned(), token));
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn roles(&self) -> Vec<Role> {
        self.roles.lock().await.clone()
    }

    pub(crate) async fn members(&self) -> Vec<Member> {
        self.members.lock().await.clone()
    }

    async fn record(&self, call: String) -> AppResult<()> {
        self.calls.lock().await.push(call.clone());

        let mut failures = self.failures.lock().await;
        if let Some((remaining, error)) = failures.get_mut(&call)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(error());
        }

        if let Some((trigger, token)) = self.cancel_after.lock().await.as_ref()
            && *trigger == call
        {
            token.cancel();
        }

        Ok(())
    }
}

#[async_trait]
impl RoleStore for FakeRoleStore {
    async fn list_roles(&self, _cancel: &CancellationToken) -> AppResult<Vec<Role>> {
        self.record("list_roles".to_owned()).await?;
        Ok(self.roles.lock().await.clone())
    }

    async fn find_role(&self, name: &str, _cancel: &CancellationToken) -> AppResult<Option<Role>> {
        self.record(format!("find:{name}")).await?;
        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.name() == name)
            .cloned())
    }

    async fn create_role(&self, role: &Role, _cancel: &CancellationToken) -> AppResult<Role> {
        self.record(format!("create:{}", role.name())).await?;
        let created = role.clone().with_id(format!("id-{}", role.name()));
        self.roles.lock().await.push(created.clone());
        Ok(created)
    }

    async fn update_role(&self, role: &Role, _cancel: &CancellationToken) -> AppResult<Role> {
        self.record(format!("update:{}", role.name())).await?;
        let mut roles = self.roles.lock().await;
        let stored = roles
            .iter_mut()
            .find(|stored| stored.name() == role.name())
            .ok_or_else(|| AppError::NotFound(format!("role '{}'", role.name())))?;
        *stored = match (role.id(), stored.id().map(str::to_owned)) {
            (None, Some(id)) => role.clone().with_id(id),
            _ => role.clone(),
        };
        Ok(role.clone())
    }

    async fn delete_role(&self, name: &str, _cancel: &CancellationToken) -> AppResult<()> {
        self.record(format!("delete:{name}")).await?;
        self.roles.lock().await.retain(|role| role.name() != name);
        Ok(())
    }

    async fn list_members(&self, _cancel: &CancellationToken) -> AppResult<Vec<Member>> {
        self.record("list_members".to_owned()).await?;
        Ok(self.members.lock().await.clone())
    }

    async fn invite_member(
        &self,
        identity: &str,
        role_id: &str,
        _cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.record(format!("invite:{identity}:{role_id}")).await?;
        let mut member = Member::new(identity);
        member.role_ids.insert(role_id.to_owned());
        self.members.lock().await.push(member);
        Ok(())
    }

    async fn assign_member_role(
        &self,
        identity: &str,
        role_id: &str,
        _cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.record(format!("assign:{identity}:{role_id}")).await?;
        let mut members = self.members.lock().await;
        let member = members
            .iter_mut()
            .find(|member| member.identity == identity)
            .ok_or_else(|| AppError::NotFound(format!("member '{identity}'")))?;
        member.role_ids.insert(role_id.to_owned());
        Ok(())
    }
}
